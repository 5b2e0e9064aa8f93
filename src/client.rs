//! Query client
//!
//! [`QueryClient`] bundles the state query router and the consensus
//! assembler behind one handle, sharing a backend, a type registry and a
//! configuration.

use crate::assembler::ConsensusAssembler;
use crate::backend::{ChainQueryBackend, ClientQueryService};
use crate::codec::{AnyClientState, AnyConsensusState, TypeRegistry};
use crate::config::QueryConfig;
use crate::router::{ClientStateResponse, ConsensusStateResponse, ProofQueryRouter};
use crate::tendermint::{ConsensusState, Header};
use crate::{Error, Height, Result};
use std::sync::Arc;
use tracing::debug;

/// Client for IBC light client state queries
///
/// ## Example
///
/// ```no_run
/// use ibc_client_query::mock::MockChain;
/// use ibc_client_query::{QueryClient, QueryConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let chain = Arc::new(MockChain::new("testchain-1"));
/// let client = QueryClient::new(chain, QueryConfig::default())?;
///
/// // Proven client state read
/// let response = client.query_client_state("07-tendermint-0", true).await?;
/// println!("proof height: {}", response.proof_height);
///
/// // Consensus state of the chain itself at its latest height
/// let (state, height) = client.query_self_consensus_state().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryClient {
    config: QueryConfig,
    router: ProofQueryRouter,
    assembler: ConsensusAssembler,
}

impl QueryClient {
    /// Create a client over a node that serves both proofs and plain queries
    ///
    /// States are decoded with the default type registry.
    pub fn new<B>(backend: Arc<B>, config: QueryConfig) -> Result<Self>
    where
        B: ChainQueryBackend + ClientQueryService + 'static,
    {
        Self::with_parts(
            backend.clone(),
            backend,
            TypeRegistry::with_default_types().into_shared(),
            config,
        )
    }

    /// Create a client from separate backend, query service and registry
    pub fn with_parts(
        backend: Arc<dyn ChainQueryBackend>,
        service: Arc<dyn ClientQueryService>,
        registry: Arc<TypeRegistry>,
        config: QueryConfig,
    ) -> Result<Self> {
        let assembler = ConsensusAssembler::new(backend.clone(), config.clone())?;
        let router = ProofQueryRouter::new(backend, service, registry);

        debug!(
            "Created query client (height: {}, validators per page: {})",
            config.height, config.validators_per_page
        );

        Ok(Self {
            config,
            router,
            assembler,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Registry states are decoded with
    pub fn registry(&self) -> &TypeRegistry {
        self.router.registry()
    }

    /// Query the client state of `client_id`, with a proof if `prove` is set
    pub async fn query_client_state(&self, client_id: &str, prove: bool) -> Result<ClientStateResponse> {
        self.router.query_client_state(client_id, prove).await
    }

    /// Query a consensus state of `client_id`
    ///
    /// `latest_height` only applies to unproven queries.
    pub async fn query_consensus_state(
        &self,
        client_id: &str,
        height: Height,
        prove: bool,
        latest_height: bool,
    ) -> Result<ConsensusStateResponse> {
        self.router
            .query_consensus_state(client_id, height, prove, latest_height)
            .await
    }

    /// Query and decode the client state of `client_id`
    pub async fn client_state(&self, client_id: &str, prove: bool) -> Result<AnyClientState> {
        self.query_client_state(client_id, prove)
            .await?
            .unpack(self.registry())
    }

    /// Query and decode the consensus state of `client_id` at `height`
    pub async fn consensus_state(&self, client_id: &str, height: Height, prove: bool) -> Result<AnyConsensusState> {
        self.query_consensus_state(client_id, height, prove, false)
            .await?
            .unpack(self.registry())
    }

    /// Consensus state the client last stored, via the query service
    pub async fn latest_consensus_state(&self, client_id: &str) -> Result<AnyConsensusState> {
        self.query_consensus_state(client_id, Height::zero(), false, true)
            .await?
            .unpack(self.registry())
    }

    /// Update header at the configured height
    pub async fn query_tendermint_header(&self) -> Result<(Header, i64)> {
        self.assembler.query_tendermint_header().await
    }

    /// Consensus state of this chain at the configured height
    pub async fn query_self_consensus_state(&self) -> Result<(ConsensusState, i64)> {
        self.assembler.query_self_consensus_state().await
    }

    /// Update header for `client_id` built on its latest stored height
    ///
    /// Reads the client state through the query service, then fills in the
    /// trusted height and the validators the client expects to sign after
    /// it: the set at the trusted height plus one, whose hash is the trusted
    /// consensus state's `next_validators_hash`.
    pub async fn query_update_header(&self, client_id: &str) -> Result<Header> {
        let client_state = match self.client_state(client_id, false).await? {
            AnyClientState::Tendermint(state) => state,
            other => {
                return Err(Error::UnsupportedOperation(format!(
                    "client {client_id} is a {}, not a Tendermint client",
                    other.type_url()
                )))
            }
        };

        let (header, height) = self.assembler.query_tendermint_header().await?;

        let trusted_height = client_state.latest_height;
        let revision = header.height().revision_number;
        if trusted_height.revision_number != revision {
            return Err(Error::UnsupportedOperation(format!(
                "client {client_id} trusts {trusted_height}, but the chain is at revision {revision}"
            )));
        }

        let next_height = i64::try_from(trusted_height.revision_height)
            .ok()
            .and_then(|h| h.checked_add(1))
            .ok_or_else(|| Error::Decode(format!("trusted height {trusted_height} out of range")))?;
        let trusted_validators = self.assembler.fetch_validator_set(next_height).await?;

        debug!(
            "Built update header for {} at height {} trusting {}",
            client_id, height, trusted_height
        );

        Ok(header.with_trusted(trusted_height, trusted_validators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BackendCall, MockChain};
    use crate::solomachine;
    use crate::tendermint::{self, TrustThreshold};
    use crate::types::Validator;

    fn validators(n: u8) -> Vec<Validator> {
        (1..=n)
            .map(|i| Validator::new(vec![i; 20], 10, vec![i; 32]))
            .collect()
    }

    fn tendermint_client(latest: u64) -> AnyClientState {
        tendermint::ClientState {
            chain_id: "counterparty-2".to_string(),
            trust_level: TrustThreshold::default(),
            trusting_period_secs: 1_209_600,
            unbonding_period_secs: 1_814_400,
            max_clock_drift_secs: 10,
            frozen_height: Height::zero(),
            latest_height: Height::new(1, latest),
            upgrade_path: Vec::new(),
        }
        .into()
    }

    fn chain() -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(30, validators(3));
        chain
    }

    #[tokio::test]
    async fn test_client_state_both_paths() {
        let chain = chain();
        let state = tendermint_client(12);
        chain
            .put_client_state("07-tendermint-0", &state, Height::new(1, 30))
            .unwrap();
        let client = QueryClient::new(chain, QueryConfig::default()).unwrap();

        assert_eq!(client.client_state("07-tendermint-0", true).await.unwrap(), state);
        assert_eq!(client.client_state("07-tendermint-0", false).await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_latest_consensus_state() {
        let chain = chain();
        for h in [5, 9, 7] {
            let state: AnyConsensusState = tendermint::ConsensusState::new(
                crate::types::Timestamp::new(h as i64, 0),
                tendermint::MerkleRoot::new(vec![h as u8; 32]),
                vec![1; 32],
            )
            .into();
            chain
                .put_consensus_state("07-tendermint-0", Height::new(1, h), &state, Height::new(1, 30))
                .unwrap();
        }
        let client = QueryClient::new(chain, QueryConfig::default()).unwrap();

        let latest = client.latest_consensus_state("07-tendermint-0").await.unwrap();
        match latest {
            AnyConsensusState::Tendermint(state) => assert_eq!(state.root.as_bytes(), &[9u8; 32]),
            other => panic!("unexpected consensus state: {other:?}"),
        }

        let proven = client
            .consensus_state("07-tendermint-0", Height::new(1, 7), true)
            .await
            .unwrap();
        assert_eq!(proven.type_url(), tendermint::TENDERMINT_CONSENSUS_STATE_TYPE_URL);
    }

    #[tokio::test]
    async fn test_update_header_fills_trusted_fields() {
        let chain = chain();
        chain
            .put_client_state("07-tendermint-0", &tendermint_client(12), Height::new(1, 30))
            .unwrap();
        let client = QueryClient::new(chain.clone(), QueryConfig::default()).unwrap();

        let header = client.query_update_header("07-tendermint-0").await.unwrap();

        assert_eq!(header.signed_header.height, 30);
        assert_eq!(header.trusted_height, Height::new(1, 12));
        assert_eq!(header.trusted_validators.as_ref().map(|v| v.len()), Some(3));
        assert!(!chain.calls().contains(&BackendCall::Commit(12)));
    }

    #[tokio::test]
    async fn test_update_header_trusts_validators_after_trusted_height() {
        let chain = chain();
        // The validator set rotates at height 13
        for h in 13..=31 {
            chain.set_validators(h, validators(5));
        }
        chain
            .put_client_state("07-tendermint-0", &tendermint_client(12), Height::new(1, 30))
            .unwrap();
        let client = QueryClient::new(chain.clone(), QueryConfig::default()).unwrap();

        let header = client.query_update_header("07-tendermint-0").await.unwrap();
        let (trusted_state, _) = ConsensusAssembler::new(chain.clone(), QueryConfig::at_height(12))
            .unwrap()
            .query_self_consensus_state()
            .await
            .unwrap();

        let trusted_validators = header.trusted_validators.unwrap();
        assert_eq!(trusted_validators.len(), 5);
        assert_eq!(trusted_validators.hash(), trusted_state.next_validators_hash);
        assert!(chain.calls().contains(&BackendCall::Validators {
            height: 13,
            page: 1,
            per_page: 10_000
        }));
    }

    #[tokio::test]
    async fn test_update_header_rejects_other_revision() {
        let chain = chain();
        let mut state = tendermint_client(12);
        if let AnyClientState::Tendermint(ref mut tm) = state {
            tm.latest_height = Height::new(2, 12);
        }
        chain
            .put_client_state("07-tendermint-0", &state, Height::new(1, 30))
            .unwrap();
        let client = QueryClient::new(chain, QueryConfig::default()).unwrap();

        assert!(matches!(
            client.query_update_header("07-tendermint-0").await,
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_header_rejects_other_client_types() {
        let chain = chain();
        let solo: AnyClientState = solomachine::ClientState {
            sequence: 1,
            is_frozen: false,
            consensus_state: solomachine::ConsensusState {
                public_key: vec![2; 33],
                diversifier: "solo".to_string(),
                timestamp: 10,
            },
        }
        .into();
        chain
            .put_client_state("06-solomachine-0", &solo, Height::new(1, 30))
            .unwrap();
        let client = QueryClient::new(chain, QueryConfig::default()).unwrap();

        assert!(matches!(
            client.query_update_header("06-solomachine-0").await,
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_configured_height_applies_to_assembly() {
        let chain = chain();
        let client = QueryClient::new(chain.clone(), QueryConfig::at_height(20)).unwrap();

        let (state, height) = client.query_self_consensus_state().await.unwrap();

        assert_eq!(height, 20);
        assert!(!state.root.is_empty());
        assert_eq!(chain.calls()[..2], [BackendCall::AbciInfo, BackendCall::Commit(20)]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = QueryConfig {
            validators_per_page: 0,
            ..Default::default()
        };
        assert!(QueryClient::new(chain(), config).is_err());
    }
}
