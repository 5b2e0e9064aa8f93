//! Solo machine light client state
//!
//! A solo machine is a single signer (e.g. a wallet) acting as a chain.

use serde::{Deserialize, Serialize};

/// Type identifier of the solo machine client state
pub const SOLOMACHINE_CLIENT_STATE_TYPE_URL: &str = "/ibc.lightclients.solomachine.v3.ClientState";

/// Type identifier of the solo machine consensus state
pub const SOLOMACHINE_CONSENSUS_STATE_TYPE_URL: &str =
    "/ibc.lightclients.solomachine.v3.ConsensusState";

/// Solo machine consensus state: the current signing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusState {
    /// Public key the solo machine signs with
    pub public_key: Vec<u8>,

    /// Diversifier to prevent replays across solo machines sharing a key
    pub diversifier: String,

    /// Unix time in nanoseconds
    pub timestamp: u64,
}

/// Solo machine client state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Next signature sequence
    pub sequence: u64,

    pub is_frozen: bool,

    pub consensus_state: ConsensusState,
}
