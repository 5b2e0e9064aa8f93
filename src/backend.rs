//! Chain query backend abstraction
//!
//! The query components never talk to a node directly. They go through
//! [`ChainQueryBackend`] for store reads with proofs and consensus data, and
//! through [`ClientQueryService`] for plain (unproven) client queries.
//! Transport, connection setup and retries belong to the implementations
//! and their callers.

use crate::codec::PackedState;
use crate::error::BoxError;
use crate::types::{CommitData, ValidatorPage};
use crate::Height;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type of backend calls
pub type BackendResult<T> = std::result::Result<T, BoxError>;

/// Value read from the authenticated store with its Merkle proof
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofQueryResult {
    /// Stored value; empty when the key is absent
    pub value: Vec<u8>,

    /// Encoded Merkle proof of (non-)existence
    pub proof: Vec<u8>,

    /// Height the proof verifies against
    pub proof_height: Height,
}

impl ProofQueryResult {
    /// Whether the key was absent from the store
    pub fn is_absent(&self) -> bool {
        self.value.is_empty()
    }
}

/// Node RPC surface used for proofs and consensus data
#[async_trait]
pub trait ChainQueryBackend: Send + Sync {
    /// Latest committed block height
    async fn abci_info(&self) -> BackendResult<i64>;

    /// Read `key` from the store together with a Merkle proof
    ///
    /// The returned proof height is the height a verifier checks the proof
    /// against, which may differ from the height the store was read at.
    async fn read_with_proof(&self, key: &[u8]) -> BackendResult<ProofQueryResult>;

    /// Commit of the block at `height`
    async fn commit(&self, height: i64) -> BackendResult<CommitData>;

    /// One page of the validator set at `height` (pages start at 1)
    async fn validators(&self, height: i64, page: usize, per_page: usize) -> BackendResult<ValidatorPage>;
}

/// Query service answering client queries without proofs
#[async_trait]
pub trait ClientQueryService: Send + Sync {
    /// Client state of `client_id`
    async fn client_state(&self, client_id: &str) -> BackendResult<PackedState>;

    /// Consensus state of `client_id` at `height`, or its latest one if `latest_height` is set
    async fn consensus_state(
        &self,
        client_id: &str,
        height: Height,
        latest_height: bool,
    ) -> BackendResult<PackedState>;
}
