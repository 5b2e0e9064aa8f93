//! Client and consensus state queries
//!
//! Every query can be answered two ways:
//! - unproven, by asking the chain's query service for the state directly;
//! - proven, by reading the state's store key together with a Merkle proof.
//!
//! The caller picks the path up front. There is no fallback from one path
//! to the other; a failure on the chosen path is returned as is.

use crate::backend::{ChainQueryBackend, ClientQueryService};
use crate::codec::{AnyClientState, AnyConsensusState, PackedState, StateKind, TypeRegistry};
use crate::host::{client_state_key, consensus_state_key};
use crate::{Error, Height, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Client state with the proof of its presence in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStateResponse {
    /// Packed client state
    pub client_state: PackedState,

    /// Merkle proof; empty for unproven queries
    pub proof: Vec<u8>,

    /// Height the proof verifies against; zero for unproven queries
    pub proof_height: Height,
}

impl ClientStateResponse {
    /// Decode the packed client state
    pub fn unpack(&self, registry: &TypeRegistry) -> Result<AnyClientState> {
        registry.unpack_client_state(&self.client_state)
    }

    /// Whether the response carries a proof
    pub fn is_proven(&self) -> bool {
        !self.proof.is_empty()
    }
}

/// Consensus state with the proof of its presence in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusStateResponse {
    /// Packed consensus state
    pub consensus_state: PackedState,

    /// Merkle proof; empty for unproven queries
    pub proof: Vec<u8>,

    /// Height the proof verifies against; zero for unproven queries
    pub proof_height: Height,
}

impl ConsensusStateResponse {
    /// Decode the packed consensus state
    pub fn unpack(&self, registry: &TypeRegistry) -> Result<AnyConsensusState> {
        registry.unpack_consensus_state(&self.consensus_state)
    }

    /// Whether the response carries a proof
    pub fn is_proven(&self) -> bool {
        !self.proof.is_empty()
    }
}

/// Routes state queries to the unproven or the proven path
#[derive(Clone)]
pub struct ProofQueryRouter {
    backend: Arc<dyn ChainQueryBackend>,
    service: Arc<dyn ClientQueryService>,
    registry: Arc<TypeRegistry>,
}

impl ProofQueryRouter {
    /// Create a router over a backend, a query service and a type registry
    pub fn new(
        backend: Arc<dyn ChainQueryBackend>,
        service: Arc<dyn ClientQueryService>,
        registry: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            backend,
            service,
            registry,
        }
    }

    /// Registry states are decoded with
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Query a client state
    ///
    /// With `prove` set, the state is read from the store with a Merkle
    /// proof; otherwise the query service is asked directly.
    pub async fn query_client_state(&self, client_id: &str, prove: bool) -> Result<ClientStateResponse> {
        if prove {
            return self.query_client_state_abci(client_id).await;
        }

        debug!("Querying client state of {} without proof", client_id);

        let packed = self
            .service
            .client_state(client_id)
            .await
            .map_err(|e| Error::backend("client_state", format!("client {client_id}"), e))?;

        // Reject anything the registry cannot decode
        self.registry.unpack_client_state(&packed)?;

        Ok(ClientStateResponse {
            client_state: packed,
            proof: Vec::new(),
            proof_height: Height::zero(),
        })
    }

    /// Read a client state and its Merkle proof from the store
    pub async fn query_client_state_abci(&self, client_id: &str) -> Result<ClientStateResponse> {
        let key = client_state_key(client_id);
        debug!("Querying client state of {} with proof at key {}", client_id, key);

        let result = self
            .backend
            .read_with_proof(key.as_bytes())
            .await
            .map_err(|e| Error::backend("read_with_proof", format!("client {client_id}, key {key}"), e))?;

        if result.is_absent() {
            warn!("Client state of {} not found at key {}", client_id, key);
            return Err(Error::NotFound {
                kind: StateKind::ClientState,
                client_id: client_id.to_string(),
                key: key.to_string(),
            });
        }

        let client_state = crate::codec::unpack_client_state(&self.registry, &result.value)?;

        Ok(ClientStateResponse {
            client_state: client_state.pack()?,
            proof: result.proof,
            proof_height: result.proof_height,
        })
    }

    /// Query a consensus state
    ///
    /// With `prove` set, the state at `height` is read from the store with a
    /// Merkle proof and `latest_height` is ignored. Otherwise the query
    /// service is asked for the state at `height`, or for the latest one when
    /// `latest_height` is set.
    pub async fn query_consensus_state(
        &self,
        client_id: &str,
        height: Height,
        prove: bool,
        latest_height: bool,
    ) -> Result<ConsensusStateResponse> {
        if prove {
            return self.query_consensus_state_abci(client_id, height).await;
        }

        debug!(
            "Querying consensus state of {} at {} (latest: {}) without proof",
            client_id, height, latest_height
        );

        let packed = self
            .service
            .consensus_state(client_id, height, latest_height)
            .await
            .map_err(|e| {
                Error::backend(
                    "consensus_state",
                    format!("client {client_id}, height {height}, latest {latest_height}"),
                    e,
                )
            })?;

        self.registry.unpack_consensus_state(&packed)?;

        Ok(ConsensusStateResponse {
            consensus_state: packed,
            proof: Vec::new(),
            proof_height: Height::zero(),
        })
    }

    /// Read a consensus state and its Merkle proof from the store
    pub async fn query_consensus_state_abci(
        &self,
        client_id: &str,
        height: Height,
    ) -> Result<ConsensusStateResponse> {
        let key = consensus_state_key(client_id, height);
        debug!(
            "Querying consensus state of {} at {} with proof at key {}",
            client_id, height, key
        );

        let result = self
            .backend
            .read_with_proof(key.as_bytes())
            .await
            .map_err(|e| Error::backend("read_with_proof", format!("client {client_id}, key {key}"), e))?;

        if result.is_absent() {
            warn!("Consensus state of {} at {} not found", client_id, height);
            return Err(Error::NotFound {
                kind: StateKind::ConsensusState,
                client_id: client_id.to_string(),
                key: key.to_string(),
            });
        }

        let consensus_state = crate::codec::unpack_consensus_state(&self.registry, &result.value)?;

        Ok(ConsensusStateResponse {
            consensus_state: consensus_state.pack()?,
            proof: result.proof,
            proof_height: result.proof_height,
        })
    }
}
