//! Store paths for light client state
//!
//! Client states live under `clients/{client-id}/clientState` and consensus
//! states under `clients/{client-id}/consensusStates/{height}`.

use crate::codec::StateKind;
use crate::Height;
use std::fmt;

/// Prefix shared by all client store paths
pub const KEY_CLIENT_STORE_PREFIX: &str = "clients";

/// Last path segment of a client state key
pub const KEY_CLIENT_STATE: &str = "clientState";

/// Path segment under which consensus states are stored
pub const KEY_CONSENSUS_STATE_PREFIX: &str = "consensusStates";

/// Opaque byte path into the authenticated store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey(Vec<u8>);

impl StoreKey {
    /// Wrap raw key bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw key bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(path) => f.write_str(path),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl AsRef<[u8]> for StoreKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Store key of a client's client state
pub fn client_state_key(client_id: &str) -> StoreKey {
    StoreKey::new(format!(
        "{KEY_CLIENT_STORE_PREFIX}/{client_id}/{KEY_CLIENT_STATE}"
    ))
}

/// Store key of a client's consensus state at `height`
pub fn consensus_state_key(client_id: &str, height: Height) -> StoreKey {
    StoreKey::new(format!(
        "{KEY_CLIENT_STORE_PREFIX}/{client_id}/{KEY_CONSENSUS_STATE_PREFIX}/{height}"
    ))
}

/// A store key recognized as one of the client key families
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStorePath {
    /// `clients/{client_id}/clientState`
    ClientState {
        /// Client identifier
        client_id: String,
    },
    /// `clients/{client_id}/consensusStates/{height}`
    ConsensusState {
        /// Client identifier
        client_id: String,
        /// Consensus height
        height: Height,
    },
}

impl ClientStorePath {
    /// Parse a raw key, returning `None` for keys outside the client families
    pub fn parse(key: &[u8]) -> Option<Self> {
        let path = std::str::from_utf8(key).ok()?;
        let rest = path.strip_prefix(KEY_CLIENT_STORE_PREFIX)?.strip_prefix('/')?;

        if let Some(client_id) = rest.strip_suffix(KEY_CLIENT_STATE) {
            let client_id = client_id.strip_suffix('/')?;
            if client_id.is_empty() || client_id.contains('/') {
                return None;
            }
            return Some(ClientStorePath::ClientState {
                client_id: client_id.to_string(),
            });
        }

        let (client_id, height) = rest.split_once(&format!("/{KEY_CONSENSUS_STATE_PREFIX}/"))?;
        if client_id.is_empty() || client_id.contains('/') {
            return None;
        }

        Some(ClientStorePath::ConsensusState {
            client_id: client_id.to_string(),
            height: height.parse().ok()?,
        })
    }

    /// State family stored under this path
    pub fn kind(&self) -> StateKind {
        match self {
            ClientStorePath::ClientState { .. } => StateKind::ClientState,
            ClientStorePath::ConsensusState { .. } => StateKind::ConsensusState,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_state_key() {
        let key = client_state_key("07-tendermint-0");
        assert_eq!(key.as_bytes(), b"clients/07-tendermint-0/clientState");
        assert_eq!(key.to_string(), "clients/07-tendermint-0/clientState");
    }

    #[test]
    fn test_consensus_state_key() {
        let key = consensus_state_key("07-tendermint-0", Height::new(1, 42));
        assert_eq!(key.as_bytes(), b"clients/07-tendermint-0/consensusStates/1-42");
    }

    #[test]
    fn test_non_utf8_key_display() {
        let key = StoreKey::new(vec![0x99, 0xff]);
        assert_eq!(key.to_string(), "0x99ff");
    }

    #[test]
    fn test_parse_store_paths() {
        let client = ClientStorePath::parse(client_state_key("clientidone").as_bytes()).unwrap();
        assert_eq!(
            client,
            ClientStorePath::ClientState {
                client_id: "clientidone".to_string()
            }
        );
        assert_eq!(client.kind(), StateKind::ClientState);

        let consensus =
            ClientStorePath::parse(consensus_state_key("clientidone", Height::new(0, 10)).as_bytes())
                .unwrap();
        assert_eq!(
            consensus,
            ClientStorePath::ConsensusState {
                client_id: "clientidone".to_string(),
                height: Height::new(0, 10),
            }
        );
        assert_eq!(consensus.kind(), StateKind::ConsensusState);
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert!(ClientStorePath::parse(&[0x99]).is_none());
        assert!(ClientStorePath::parse(b"connections/connection-0").is_none());
        assert!(ClientStorePath::parse(b"clients//clientState").is_none());
        assert!(ClientStorePath::parse(b"clients/a/b/clientState").is_none());
        assert!(ClientStorePath::parse(b"clients/a/consensusStates/nonsense").is_none());
    }
}
