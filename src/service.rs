//! The voting service: a thin mapping layer between the gRPC surface and
//! the document store.
//!
//! Listing follows the store's native scan order and is not globally
//! consistent: items inserted or modified between pages may appear zero or
//! more times across a pagination sequence. Callers get the weak guarantee
//! the store provides, nothing stronger.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument};

use crate::cursor::PagingKey;
use crate::proto::voting::v1 as pb;
use crate::proto::voting::v1::voting_service_server::VotingService as VotingServiceApi;
use crate::store::{ProvisionOutcome, StoreError, VoteStore};
use crate::voteable::Voteable;

pub struct VotingService {
    store: Arc<dyn VoteStore>,
}

impl VotingService {
    /// Ensures the backing table exists, then hands back a service ready
    /// to serve. Runs once per process, before any RPC is accepted; a
    /// provisioning failure other than "table already exists" is fatal.
    pub async fn provision(store: Arc<dyn VoteStore>) -> Result<Self, StoreError> {
        match store.provision().await? {
            ProvisionOutcome::Created => debug!("created voteables table"),
            ProvisionOutcome::AlreadyExists => info!("voteables table exists"),
        }
        Ok(Self { store })
    }
}

#[tonic::async_trait]
impl VotingServiceApi for VotingService {
    #[instrument(skip_all, fields(voteable), err)]
    async fn create_voteable(
        &self,
        request: Request<pb::CreateVoteableRequest>,
    ) -> Result<Response<pb::CreateVoteableResponse>, Status> {
        let req = request.into_inner();

        // Answer lists are persisted as-is; emptiness is not validated,
        // matching the permissive contract of the API.
        let voteable = Voteable::new(req.question, req.answers);
        self.store
            .put(&voteable)
            .await
            .map_err(status_from_store)?;

        tracing::Span::current().record("voteable", voteable.id.as_str());
        debug!(voteable = %voteable.id, "created voteable");
        Ok(Response::new(pb::CreateVoteableResponse {
            uuid: voteable.id,
        }))
    }

    #[instrument(skip_all, fields(page_size = request.get_ref().page_size), err)]
    async fn list_voteables(
        &self,
        request: Request<pb::ListVoteablesRequest>,
    ) -> Result<Response<pb::ListVoteablesResponse>, Status> {
        let req = request.into_inner();

        let start_after = if req.paging_key.is_empty() {
            None
        } else {
            let cursor = PagingKey::decode(&req.paging_key)
                .map_err(|e| Status::invalid_argument(e.to_string()))?;
            match cursor {
                // A terminal cursor yields an empty page and another
                // terminal cursor, so clients can loop safely.
                PagingKey::End => {
                    return Ok(Response::new(pb::ListVoteablesResponse {
                        votables: vec![],
                        paging_key: encode_paging_key(PagingKey::End)?,
                    }));
                }
                PagingKey::Resume(last_id) => Some(last_id),
            }
        };

        let page = self
            .store
            .scan(req.page_size, start_after.as_deref())
            .await
            .map_err(status_from_store)?;

        let paging_key = encode_paging_key(match page.last_key {
            Some(last_id) => PagingKey::Resume(last_id),
            None => PagingKey::End,
        })?;

        // Vote counts stay out of the listing projection on purpose.
        let votables = page
            .items
            .into_iter()
            .map(|v| pb::Voteable {
                uuid: v.id,
                question: v.question,
                answers: v.answers,
            })
            .collect();

        Ok(Response::new(pb::ListVoteablesResponse {
            votables,
            paging_key,
        }))
    }

    #[instrument(
        skip_all,
        fields(
            uuid = %request.get_ref().uuid,
            answer_index = request.get_ref().answer_index,
        ),
        err
    )]
    async fn cast_vote(
        &self,
        request: Request<pb::CastVoteRequest>,
    ) -> Result<Response<pb::CastVoteResponse>, Status> {
        let req = request.into_inner();

        // No pre-validation of the id or index: the store's atomic
        // increment rejects an unknown id or out-of-range index itself.
        self.store
            .increment_vote(&req.uuid, req.answer_index)
            .await
            .map_err(status_from_store)?;

        Ok(Response::new(pb::CastVoteResponse {}))
    }
}

fn encode_paging_key(key: PagingKey) -> Result<Vec<u8>, Status> {
    key.encode()
        .map_err(|e| Status::internal(e.to_string()))
}

fn status_from_store(err: StoreError) -> Status {
    match &err {
        StoreError::Update(_) => Status::failed_precondition(err.to_string()),
        _ => Status::internal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::store::MemoryStore;

    async fn service_with_store() -> (VotingService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = VotingService::provision(store.clone()).await.unwrap();
        (service, store)
    }

    async fn create(service: &VotingService, question: &str, answers: &[&str]) -> String {
        let response = service
            .create_voteable(Request::new(pb::CreateVoteableRequest {
                question: question.to_string(),
                answers: answers.iter().map(|a| a.to_string()).collect(),
            }))
            .await
            .unwrap();
        response.into_inner().uuid
    }

    #[tokio::test]
    async fn create_then_list_shows_question_and_answers() {
        let (service, _) = service_with_store().await;
        let uuid = create(&service, "foo-0", &["bar-0", "baz-0"]).await;
        assert!(uuid::Uuid::parse_str(&uuid).is_ok());

        let response = service
            .list_voteables(Request::new(pb::ListVoteablesRequest::default()))
            .await
            .unwrap()
            .into_inner();

        let entry = response
            .votables
            .iter()
            .find(|v| v.uuid == uuid)
            .expect("created voteable listed");
        assert_eq!(entry.question, "foo-0");
        assert_eq!(entry.answers, vec!["bar-0", "baz-0"]);
        assert_eq!(PagingKey::decode(&response.paging_key).unwrap(), PagingKey::End);
    }

    #[tokio::test]
    async fn votes_start_at_zero_and_cast_increments_one_index() {
        let (service, store) = service_with_store().await;
        let uuid = create(&service, "foo-0", &["bar-0", "baz-0"]).await;

        let before = store.scan(0, None).await.unwrap();
        assert_eq!(before.items[0].votes, vec![0, 0]);

        service
            .cast_vote(Request::new(pb::CastVoteRequest {
                uuid: uuid.clone(),
                answer_index: 0,
            }))
            .await
            .unwrap();

        let after = store.scan(0, None).await.unwrap();
        assert_eq!(after.items[0].votes, vec![1, 0]);
    }

    #[tokio::test]
    async fn cast_vote_out_of_range_fails_and_counters_hold() {
        let (service, store) = service_with_store().await;
        let uuid = create(&service, "foo-0", &["bar-0", "baz-0"]).await;

        let status = service
            .cast_vote(Request::new(pb::CastVoteRequest {
                uuid,
                answer_index: 2,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let page = store.scan(0, None).await.unwrap();
        assert_eq!(page.items[0].votes, vec![0, 0]);
    }

    #[tokio::test]
    async fn cast_vote_unknown_uuid_fails() {
        let (service, _) = service_with_store().await;
        let status = service
            .cast_vote(Request::new(pb::CastVoteRequest {
                uuid: "no-such-item".to_string(),
                answer_index: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn malformed_paging_key_fails_the_call() {
        let (service, _) = service_with_store().await;
        let status = service
            .list_voteables(Request::new(pb::ListVoteablesRequest {
                page_size: 0,
                paging_key: b"not a cursor".to_vec(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn terminal_cursor_round_trips_to_an_empty_page() {
        let (service, _) = service_with_store().await;
        create(&service, "foo-0", &["bar-0"]).await;

        let terminal = PagingKey::End.encode().unwrap();
        let response = service
            .list_voteables(Request::new(pb::ListVoteablesRequest {
                page_size: 10,
                paging_key: terminal.clone(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.votables.is_empty());
        assert_eq!(response.paging_key, terminal);
    }
}
