//! Tendermint light client state, consensus state and header

use crate::types::{CommitData, Timestamp, ValidatorSet};
use crate::Height;
use serde::{Deserialize, Serialize};

/// Type identifier of the Tendermint client state
pub const TENDERMINT_CLIENT_STATE_TYPE_URL: &str = "/ibc.lightclients.tendermint.v1.ClientState";

/// Type identifier of the Tendermint consensus state
pub const TENDERMINT_CONSENSUS_STATE_TYPE_URL: &str =
    "/ibc.lightclients.tendermint.v1.ConsensusState";

/// Type identifier of the Tendermint header
pub const TENDERMINT_HEADER_TYPE_URL: &str = "/ibc.lightclients.tendermint.v1.Header";

/// Fraction of voting power that must sign for an untrusted header to be accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustThreshold {
    pub numerator: u64,
    pub denominator: u64,
}

impl Default for TrustThreshold {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 3,
        }
    }
}

/// Tendermint light client state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Chain the client tracks
    pub chain_id: String,

    pub trust_level: TrustThreshold,

    /// Trusting period in seconds
    pub trusting_period_secs: u64,

    /// Unbonding period in seconds
    pub unbonding_period_secs: u64,

    /// Maximum tolerated clock drift in seconds
    pub max_clock_drift_secs: u64,

    /// Height at which the client was frozen, zero if active
    pub frozen_height: Height,

    /// Latest height the client was updated to
    pub latest_height: Height,

    /// Store path of the upgraded client state
    pub upgrade_path: Vec<String>,
}

impl ClientState {
    /// Whether misbehaviour froze this client
    pub fn is_frozen(&self) -> bool {
        !self.frozen_height.is_zero()
    }
}

/// Commitment root of the application store at a height
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleRoot {
    pub hash: Vec<u8>,
}

impl MerkleRoot {
    /// Wrap a store root hash
    pub fn new(hash: impl Into<Vec<u8>>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.hash
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }
}

/// Tendermint consensus state
///
/// Describes a chain at one height: its block time, the application store
/// root, and the hash of the validator set that signs the next block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusState {
    pub timestamp: Timestamp,
    pub root: MerkleRoot,
    pub next_validators_hash: Vec<u8>,
}

impl ConsensusState {
    /// Create a new consensus state
    pub fn new(timestamp: Timestamp, root: MerkleRoot, next_validators_hash: Vec<u8>) -> Self {
        Self {
            timestamp,
            root,
            next_validators_hash,
        }
    }

    /// Consensus state for the block committed by `commit`
    ///
    /// `next_validators` must be the validator set at the height after the
    /// commit, i.e. the set that will sign the next block.
    pub fn from_commit(commit: &CommitData, next_validators: &ValidatorSet) -> Self {
        Self::new(
            commit.time,
            MerkleRoot::new(commit.app_hash.clone()),
            next_validators.hash(),
        )
    }
}

/// Header submitted to update a Tendermint client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Commit of the new block
    pub signed_header: CommitData,

    /// Validator set that signed the commit
    pub validator_set: ValidatorSet,

    /// Consensus height the client already trusts; filled in by the submitter
    pub trusted_height: Height,

    /// Validator set at the trusted height; filled in by the submitter
    pub trusted_validators: Option<ValidatorSet>,
}

impl Header {
    /// Header for a commit and the validator set that signed it
    pub fn new(signed_header: CommitData, validator_set: ValidatorSet) -> Self {
        Self {
            signed_header,
            validator_set,
            trusted_height: Height::zero(),
            trusted_validators: None,
        }
    }

    /// Height of the committed block, with the revision from its chain id
    pub fn height(&self) -> Height {
        Height::from_chain_id(
            &self.signed_header.chain_id,
            self.signed_header.height.max(0) as u64,
        )
    }

    /// Block time of the committed block
    pub fn timestamp(&self) -> Timestamp {
        self.signed_header.time
    }

    /// Set the trusted height and validators the update builds on
    pub fn with_trusted(mut self, trusted_height: Height, trusted_validators: ValidatorSet) -> Self {
        self.trusted_height = trusted_height;
        self.trusted_validators = Some(trusted_validators);
        self
    }
}
