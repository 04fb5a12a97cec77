pub mod voting {
    pub mod v1 {
        tonic::include_proto!("voting.v1");
    }
}
