//! In-memory chain backend for testing and development
//!
//! [`MockChain`] implements both [`ChainQueryBackend`] and
//! [`ClientQueryService`] over in-memory maps. Every call is recorded so
//! tests can assert exactly which heights and keys were queried, and calls
//! can be made to fail or to take time.

use crate::backend::{BackendResult, ChainQueryBackend, ClientQueryService, ProofQueryResult};
use crate::codec::{AnyClientState, AnyConsensusState, PackedState};
use crate::host::{client_state_key, consensus_state_key, ClientStorePath};
use crate::types::{CommitData, Timestamp, Validator, ValidatorPage};
use crate::Height;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Failures produced by the mock backend
#[derive(Debug, Error)]
pub enum MockError {
    /// Requested height is past the chain tip
    #[error("height {requested} must be less than or equal to the current blockchain height {latest}")]
    HeightNotAvailable { requested: i64, latest: i64 },

    /// No validator set stored for the height
    #[error("validator set for height {0} is not available")]
    ValidatorsNotAvailable(i64),

    /// Page outside the validator set
    #[error("page should be within [1, {max}] range, given {page}")]
    PageOutOfRange { page: usize, max: usize },

    /// Resource unknown to the query service
    #[error("{0} not found")]
    NotFound(String),

    /// Stored value could not be read as a packed state
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// Failure injected with [`MockChain::fail_on`]
    #[error("simulated failure in {0}")]
    Injected(&'static str),
}

/// Backend call recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    AbciInfo,
    ReadWithProof(Vec<u8>),
    Commit(i64),
    Validators { height: i64, page: usize, per_page: usize },
    ClientState(String),
    ConsensusState { client_id: String, height: Height, latest_height: bool },
}

impl BackendCall {
    /// Name of the call, as used by [`MockChain::fail_on`]
    pub fn name(&self) -> &'static str {
        match self {
            BackendCall::AbciInfo => "abci_info",
            BackendCall::ReadWithProof(_) => "read_with_proof",
            BackendCall::Commit(_) => "commit",
            BackendCall::Validators { .. } => "validators",
            BackendCall::ClientState(_) => "client_state",
            BackendCall::ConsensusState { .. } => "consensus_state",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    proof: Vec<u8>,
    proof_height: Height,
}

/// In-memory chain
pub struct MockChain {
    chain_id: String,
    latest_height: AtomicI64,
    store: RwLock<HashMap<Vec<u8>, StoredValue>>,
    commits: RwLock<HashMap<i64, CommitData>>,
    validators: RwLock<HashMap<i64, Vec<Validator>>>,
    calls: Mutex<Vec<BackendCall>>,
    failing: RwLock<HashSet<&'static str>>,
    latency: RwLock<Duration>,
}

impl MockChain {
    /// Create an empty chain
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            latest_height: AtomicI64::new(0),
            store: RwLock::new(HashMap::new()),
            commits: RwLock::new(HashMap::new()),
            validators: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            latency: RwLock::new(Duration::ZERO),
        }
    }

    /// Chain id blocks are produced under
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Set the latest block height
    pub fn set_latest_height(&self, height: i64) {
        self.latest_height.store(height, Ordering::Relaxed);
    }

    /// Latest block height
    pub fn latest_height(&self) -> i64 {
        self.latest_height.load(Ordering::Relaxed)
    }

    /// Produce blocks `1..=height`, each with the same validator set
    ///
    /// The validator set is also stored for `height + 1`, as a node knows
    /// the next validators once a block is committed.
    pub fn produce_blocks(&self, height: i64, validators: Vec<Validator>) {
        for h in 1..=height {
            self.insert_block(h, validators.clone());
        }
        self.set_validators(height + 1, validators);
        self.set_latest_height(height);
    }

    /// Store a commit and its validator set at `height`
    pub fn insert_block(&self, height: i64, validators: Vec<Validator>) {
        self.commits.write().insert(height, self.mock_commit(height));
        self.set_validators(height, validators);
    }

    /// Replace the commit stored at its height
    pub fn set_commit(&self, commit: CommitData) {
        self.commits.write().insert(commit.height, commit);
    }

    /// Replace the validator set at `height`
    pub fn set_validators(&self, height: i64, validators: Vec<Validator>) {
        self.validators.write().insert(height, validators);
    }

    /// Drop the validator set at `height`
    pub fn remove_validators(&self, height: i64) {
        self.validators.write().remove(&height);
    }

    /// Store a raw value with the proof returned for it
    pub fn put_raw(&self, key: &[u8], value: Vec<u8>, proof: Vec<u8>, proof_height: Height) {
        self.store.write().insert(
            key.to_vec(),
            StoredValue {
                value,
                proof,
                proof_height,
            },
        );
    }

    /// Store a client state under its key
    pub fn put_client_state(&self, client_id: &str, state: &AnyClientState, proof_height: Height) -> crate::Result<()> {
        let key = client_state_key(client_id);
        let value = state.pack()?.encode()?;
        let proof = mock_proof(key.as_bytes(), &value);
        self.put_raw(key.as_bytes(), value, proof, proof_height);
        Ok(())
    }

    /// Store a consensus state under its key
    pub fn put_consensus_state(
        &self,
        client_id: &str,
        height: Height,
        state: &AnyConsensusState,
        proof_height: Height,
    ) -> crate::Result<()> {
        let key = consensus_state_key(client_id, height);
        let value = state.pack()?.encode()?;
        let proof = mock_proof(key.as_bytes(), &value);
        self.put_raw(key.as_bytes(), value, proof, proof_height);
        Ok(())
    }

    /// Make every call with this name fail
    pub fn fail_on(&self, call: &'static str) {
        self.failing.write().insert(call);
    }

    /// Stop failing calls with this name
    pub fn recover(&self, call: &'static str) {
        self.failing.write().remove(call);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn enter(&self, call: BackendCall) -> BackendResult<()> {
        let name = call.name();
        self.calls.lock().push(call);

        let latency = *self.latency.read();
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }

        if self.failing.read().contains(name) {
            return Err(MockError::Injected(name).into());
        }
        Ok(())
    }

    fn mock_commit(&self, height: i64) -> CommitData {
        let app_hash = Sha256::digest(format!("app-{height}")).to_vec();
        CommitData {
            chain_id: self.chain_id.clone(),
            height,
            time: Timestamp::new(1_700_000_000 + height * 5, 0),
            app_hash,
            validators_hash: Vec::new(),
            next_validators_hash: Vec::new(),
            signatures: Vec::new(),
        }
    }

    fn stored_packed_state(&self, key: &[u8], what: String) -> BackendResult<PackedState> {
        let store = self.store.read();
        let stored = store
            .get(key)
            .filter(|stored| !stored.value.is_empty())
            .ok_or_else(|| MockError::NotFound(what))?;

        PackedState::decode(&stored.value).map_err(|e| MockError::Corrupt(e.to_string()).into())
    }

    fn latest_consensus_height(&self, client_id: &str) -> Option<Height> {
        self.store
            .read()
            .keys()
            .filter_map(|key| match ClientStorePath::parse(key)? {
                ClientStorePath::ConsensusState { client_id: id, height } if id == client_id => Some(height),
                _ => None,
            })
            .max()
    }
}

/// Deterministic stand-in for a Merkle proof over `key` and `value`
pub fn mock_proof(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize().to_vec()
}

#[async_trait]
impl ChainQueryBackend for MockChain {
    async fn abci_info(&self) -> BackendResult<i64> {
        self.enter(BackendCall::AbciInfo).await?;
        Ok(self.latest_height())
    }

    async fn read_with_proof(&self, key: &[u8]) -> BackendResult<ProofQueryResult> {
        self.enter(BackendCall::ReadWithProof(key.to_vec())).await?;

        let result = match self.store.read().get(key) {
            Some(stored) => ProofQueryResult {
                value: stored.value.clone(),
                proof: stored.proof.clone(),
                proof_height: stored.proof_height,
            },
            // Absence proof at the current tip
            None => ProofQueryResult {
                value: Vec::new(),
                proof: mock_proof(key, &[]),
                proof_height: Height::from_chain_id(&self.chain_id, self.latest_height().max(0) as u64),
            },
        };
        Ok(result)
    }

    async fn commit(&self, height: i64) -> BackendResult<CommitData> {
        self.enter(BackendCall::Commit(height)).await?;

        let latest = self.latest_height();
        if height > latest {
            return Err(MockError::HeightNotAvailable {
                requested: height,
                latest,
            }
            .into());
        }

        self.commits
            .read()
            .get(&height)
            .cloned()
            .ok_or_else(|| MockError::NotFound(format!("commit at height {height}")).into())
    }

    async fn validators(&self, height: i64, page: usize, per_page: usize) -> BackendResult<ValidatorPage> {
        self.enter(BackendCall::Validators {
            height,
            page,
            per_page,
        })
        .await?;

        let sets = self.validators.read();
        let validators = sets
            .get(&height)
            .ok_or(MockError::ValidatorsNotAvailable(height))?;

        let total = validators.len();
        let per_page = per_page.max(1);
        let max_page = total.div_ceil(per_page).max(1);
        if page == 0 || page > max_page {
            return Err(MockError::PageOutOfRange { page, max: max_page }.into());
        }

        let start = (page - 1) * per_page;
        let end = (start + per_page).min(total);

        Ok(ValidatorPage {
            block_height: height,
            validators: validators[start..end].to_vec(),
            total,
        })
    }
}

#[async_trait]
impl ClientQueryService for MockChain {
    async fn client_state(&self, client_id: &str) -> BackendResult<PackedState> {
        self.enter(BackendCall::ClientState(client_id.to_string())).await?;

        let key = client_state_key(client_id);
        self.stored_packed_state(key.as_bytes(), format!("client {client_id}"))
    }

    async fn consensus_state(
        &self,
        client_id: &str,
        height: Height,
        latest_height: bool,
    ) -> BackendResult<PackedState> {
        self.enter(BackendCall::ConsensusState {
            client_id: client_id.to_string(),
            height,
            latest_height,
        })
        .await?;

        let height = if latest_height {
            self.latest_consensus_height(client_id)
                .ok_or_else(|| MockError::NotFound(format!("consensus states of client {client_id}")))?
        } else {
            height
        };

        let key = consensus_state_key(client_id, height);
        self.stored_packed_state(
            key.as_bytes(),
            format!("consensus state of client {client_id} at {height}"),
        )
    }
}
