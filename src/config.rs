use std::net::SocketAddr;
use std::{fs, io};

use clap::{Args, Parser};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Dynamodb,
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ballotd",
    about = "Voting gRPC service",
    version = crate::version::VERSION,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(
        long,
        env = "BALLOTD_BIND",
        value_name = "ADDR",
        default_value = "127.0.0.1:3000"
    )]
    pub bind: SocketAddr,

    #[arg(
        long,
        env = "BALLOTD_STORE",
        value_name = "BACKEND",
        default_value = "dynamodb",
        value_enum
    )]
    pub store: StoreBackend,

    #[arg(
        long = "table-name",
        env = "BALLOTD_TABLE_NAME",
        value_name = "NAME",
        default_value = "voteables"
    )]
    pub table_name: String,

    #[arg(
        long = "db-host",
        env = "BALLOTD_DB_HOST",
        value_name = "HOST",
        default_value = "localhost"
    )]
    pub db_host: String,

    #[arg(
        long = "db-port",
        env = "BALLOTD_DB_PORT",
        value_name = "PORT",
        default_value_t = 8000
    )]
    pub db_port: u16,

    #[arg(
        long = "aws-region",
        env = "BALLOTD_AWS_REGION",
        value_name = "REGION",
        default_value = "us-west-2"
    )]
    pub aws_region: String,

    #[arg(
        long = "aws-id",
        env = "BALLOTD_AWS_ID",
        value_name = "ID",
        default_value = ""
    )]
    pub aws_id: String,

    #[arg(
        long = "aws-secret",
        env = "BALLOTD_AWS_SECRET",
        value_name = "SECRET",
        default_value = ""
    )]
    pub aws_secret: String,

    #[arg(
        long = "aws-token",
        env = "BALLOTD_AWS_TOKEN",
        value_name = "TOKEN",
        default_value = ""
    )]
    pub aws_token: String,
}

const SECRETS_DIR: &str = "/run/secrets/";

impl Config {
    /// Credential values pointing at a mounted secrets file are replaced
    /// with the file contents.
    pub fn resolve_secrets(&mut self) -> io::Result<()> {
        for value in [&mut self.aws_secret, &mut self.aws_token] {
            if value.starts_with(SECRETS_DIR) {
                let contents = fs::read_to_string(value.as_str())?;
                *value = contents.trim_end().to_string();
            }
        }
        Ok(())
    }
}
