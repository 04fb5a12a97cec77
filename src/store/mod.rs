//! Document store backing the voting service.
//!
//! Any backend offering the four primitives of [`VoteStore`] can serve:
//! idempotent table provisioning, put-record, paginated scan with a
//! resumption key, and atomic positional increment. `DynamoStore` talks to
//! AWS DynamoDB; `MemoryStore` is an in-process backend for tests and
//! local development.

use async_trait::async_trait;

use crate::voteable::Voteable;

pub mod dynamodb;
pub mod memory;

pub use dynamodb::DynamoStore;
pub use memory::MemoryStore;

/// Outcome of idempotent table provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

/// One page of a table scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Voteable>,
    /// Id of the last evaluated item, to resume the scan after; `None`
    /// once the scan is exhausted.
    pub last_key: Option<String>,
}

#[derive(Debug)]
pub enum StoreError {
    Provision(String),
    Put(String),
    Scan(String),
    Update(String),
    Decode(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provision(msg) => write!(f, "table provisioning failed: {msg}"),
            Self::Put(msg) => write!(f, "put failed: {msg}"),
            Self::Scan(msg) => write!(f, "scan failed: {msg}"),
            Self::Update(msg) => write!(f, "update failed: {msg}"),
            Self::Decode(msg) => write!(f, "record decode failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Creates the backing table if it is absent. An existing table is
    /// reported as [`ProvisionOutcome::AlreadyExists`], not an error.
    async fn provision(&self) -> Result<ProvisionOutcome, StoreError>;

    /// Persists a new voteable record. Does not overwrite an existing
    /// record with the same id.
    async fn put(&self, voteable: &Voteable) -> Result<(), StoreError>;

    /// Scans one page of the table in native scan order, resuming after
    /// `start_after` when present. A `limit` of zero or less means no
    /// limit: the scan runs to the end of the table.
    async fn scan(&self, limit: i64, start_after: Option<&str>) -> Result<ScanPage, StoreError>;

    /// Atomically increments `votes[answer_index]` for the given item,
    /// without reading the record first. An unknown id or out-of-range
    /// index fails at the store and leaves all counters unchanged.
    async fn increment_vote(&self, id: &str, answer_index: i32) -> Result<(), StoreError>;
}
