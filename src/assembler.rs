//! Header and self consensus state assembly from live consensus data
//!
//! Both assemblers resolve a block height (the configured one, or the
//! chain's latest), fetch the commit at that height and a validator set,
//! and combine them. The header pairs a commit with the validators that
//! signed it. The consensus state pairs a commit with the validators of the
//! *next* height, because it records who will sign the next block.
//!
//! Each step depends on the previous one and any failure aborts the whole
//! assembly. Nothing is retried.

use crate::backend::ChainQueryBackend;
use crate::config::QueryConfig;
use crate::height::resolve_block_height;
use crate::tendermint::{ConsensusState, Header};
use crate::types::{CommitData, Validator, ValidatorSet};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Builds update headers and self consensus states
#[derive(Clone)]
pub struct ConsensusAssembler {
    backend: Arc<dyn ChainQueryBackend>,
    config: QueryConfig,
}

impl ConsensusAssembler {
    /// Create an assembler over a backend
    pub fn new(backend: Arc<dyn ChainQueryBackend>, config: QueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Configuration in use
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Header for the configured height, and the height used
    pub async fn query_tendermint_header(&self) -> Result<(Header, i64)> {
        self.query_tendermint_header_at(self.config.height).await
    }

    /// Header for `height` (`0` for the latest), and the height used
    pub async fn query_tendermint_header_at(&self, height: i64) -> Result<(Header, i64)> {
        let height = self.resolve_height(height).await?;
        let commit = self.fetch_commit(height).await?;
        let validator_set = self.fetch_validator_set(height).await?;

        debug!(
            "Assembled header at height {} with {} validators",
            height,
            validator_set.len()
        );

        Ok((Header::new(commit, validator_set), height))
    }

    /// Consensus state of this chain at the configured height, and the height used
    pub async fn query_self_consensus_state(&self) -> Result<(ConsensusState, i64)> {
        self.query_self_consensus_state_at(self.config.height).await
    }

    /// Consensus state of this chain at `height` (`0` for the latest), and the height used
    pub async fn query_self_consensus_state_at(&self, height: i64) -> Result<(ConsensusState, i64)> {
        let height = self.resolve_height(height).await?;
        let commit = self.fetch_commit(height).await?;

        let next_height = height
            .checked_add(1)
            .ok_or_else(|| Error::InvalidConfig(format!("height {height} has no successor")))?;
        let next_validators = self.fetch_validator_set(next_height).await?;

        debug!(
            "Assembled self consensus state at height {} (next validators from {})",
            height, next_height
        );

        Ok((ConsensusState::from_commit(&commit, &next_validators), height))
    }

    /// Ask the node for its status, then pick the height to assemble at
    ///
    /// The status call is made even for an explicit height, so an
    /// unreachable node fails the request before any consensus data is read.
    async fn resolve_height(&self, requested: i64) -> Result<i64> {
        if requested < 0 {
            return Err(Error::InvalidConfig(format!(
                "height must not be negative, got {requested}"
            )));
        }

        let latest = self
            .backend
            .abci_info()
            .await
            .map_err(|e| Error::backend("abci_info", "latest height", e))?;

        let height = resolve_block_height(requested, latest);
        trace!("Resolved height {} (requested {}, latest {})", height, requested, latest);
        Ok(height)
    }

    async fn fetch_commit(&self, height: i64) -> Result<CommitData> {
        self.backend
            .commit(height)
            .await
            .map_err(|e| Error::backend("commit", format!("height {height}"), e))
    }

    /// Fetch the whole validator set at `height`
    ///
    /// Pages are requested until the reported total is reached, so a set
    /// larger than one page is never silently truncated.
    pub(crate) async fn fetch_validator_set(&self, height: i64) -> Result<ValidatorSet> {
        let per_page = self.config.validators_per_page;
        let mut validators: Vec<Validator> = Vec::new();
        let mut page = 1;

        loop {
            let result = self
                .backend
                .validators(height, page, per_page)
                .await
                .map_err(|e| Error::backend("validators", format!("height {height}, page {page}"), e))?;

            let received = result.validators.len();
            validators.extend(result.validators);

            if validators.len() >= result.total {
                break;
            }

            if received == 0 {
                return Err(Error::backend(
                    "validators",
                    format!("height {height}, page {page}"),
                    format!(
                        "validator set truncated: got {} of {} validators",
                        validators.len(),
                        result.total
                    )
                    .into(),
                ));
            }

            warn!(
                "Validator set at height {} exceeds page size {} ({} of {}), fetching page {}",
                height,
                per_page,
                validators.len(),
                result.total,
                page + 1
            );
            page += 1;
        }

        ValidatorSet::new(validators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BackendCall, MockChain};
    use crate::types::Timestamp;

    fn validators(n: u8, power: i64) -> Vec<Validator> {
        (1..=n)
            .map(|i| Validator::new(vec![i; 20], power, vec![i; 32]))
            .collect()
    }

    fn assembler(chain: &Arc<MockChain>, config: QueryConfig) -> ConsensusAssembler {
        ConsensusAssembler::new(chain.clone(), config).unwrap()
    }

    #[tokio::test]
    async fn test_header_at_latest_height() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(100, validators(3, 10));

        let (header, height) = assembler(&chain, QueryConfig::default())
            .query_tendermint_header()
            .await
            .unwrap();

        assert_eq!(height, 100);
        assert_eq!(header.signed_header.height, 100);
        assert_eq!(header.validator_set.len(), 3);
        assert!(header.trusted_validators.is_none());
        assert_eq!(
            chain.calls(),
            vec![
                BackendCall::AbciInfo,
                BackendCall::Commit(100),
                BackendCall::Validators {
                    height: 100,
                    page: 1,
                    per_page: 10_000
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_header_at_explicit_height_still_checks_status() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(100, validators(3, 10));

        let (_, height) = assembler(&chain, QueryConfig::at_height(60))
            .query_tendermint_header()
            .await
            .unwrap();

        assert_eq!(height, 60);
        assert_eq!(chain.calls()[..2], [BackendCall::AbciInfo, BackendCall::Commit(60)]);
    }

    #[tokio::test]
    async fn test_explicit_height_fails_when_status_fails() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(100, validators(3, 10));
        chain.fail_on("abci_info");
        let assembler = assembler(&chain, QueryConfig::at_height(50));

        let err = assembler.query_tendermint_header().await.unwrap_err();
        assert!(matches!(err, Error::Backend { call: "abci_info", .. }));

        let err = assembler.query_self_consensus_state().await.unwrap_err();
        assert!(matches!(err, Error::Backend { call: "abci_info", .. }));

        assert_eq!(chain.calls(), vec![BackendCall::AbciInfo, BackendCall::AbciInfo]);
    }

    #[tokio::test]
    async fn test_negative_height_rejected() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(10, validators(1, 10));
        let assembler = assembler(&chain, QueryConfig::default());

        assert!(matches!(
            assembler.query_tendermint_header_at(-1).await,
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            assembler.query_self_consensus_state_at(-5).await,
            Err(Error::InvalidConfig(_))
        ));
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_header_paginates_large_validator_sets() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(5, validators(5, 10));

        let config = QueryConfig {
            validators_per_page: 2,
            ..Default::default()
        };
        let (header, _) = assembler(&chain, config)
            .query_tendermint_header_at(5)
            .await
            .unwrap();

        assert_eq!(header.validator_set.len(), 5);
        let pages: Vec<usize> = chain
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Validators { page, .. } => Some(page),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_commit_failure_aborts_before_validators() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(10, validators(1, 10));
        chain.fail_on("commit");

        let err = assembler(&chain, QueryConfig::default())
            .query_tendermint_header()
            .await
            .unwrap_err();

        assert!(err.is_backend());
        assert_eq!(chain.calls(), vec![BackendCall::AbciInfo, BackendCall::Commit(10)]);
    }

    #[tokio::test]
    async fn test_status_failure_is_backend_error() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.fail_on("abci_info");

        let err = assembler(&chain, QueryConfig::default())
            .query_self_consensus_state()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend { call: "abci_info", .. }));
    }

    #[tokio::test]
    async fn test_self_consensus_uses_next_validators() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(50, validators(2, 10));
        // The set changes after height 50
        chain.set_validators(51, validators(4, 7));

        let (state, height) = assembler(&chain, QueryConfig::at_height(50))
            .query_self_consensus_state()
            .await
            .unwrap();

        let at_50 = ValidatorSet::new(validators(2, 10)).unwrap();
        let at_51 = ValidatorSet::new(validators(4, 7)).unwrap();

        assert_eq!(height, 50);
        assert_eq!(state.next_validators_hash, at_51.hash());
        assert_ne!(state.next_validators_hash, at_50.hash());
        assert_eq!(state.timestamp, Timestamp::new(1_700_000_000 + 50 * 5, 0));
        assert_eq!(
            chain.calls(),
            vec![
                BackendCall::AbciInfo,
                BackendCall::Commit(50),
                BackendCall::Validators {
                    height: 51,
                    page: 1,
                    per_page: 10_000
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_self_consensus_root_is_app_hash() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(20, validators(1, 10));

        let (state, _) = assembler(&chain, QueryConfig::default())
            .query_self_consensus_state()
            .await
            .unwrap();

        let commit = chain.commit(20).await.unwrap();
        assert_eq!(state.root.as_bytes(), commit.app_hash.as_slice());
    }

    #[tokio::test]
    async fn test_self_consensus_missing_next_validators() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(50, validators(2, 10));
        chain.remove_validators(51);

        let err = assembler(&chain, QueryConfig::at_height(50))
            .query_self_consensus_state()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend { call: "validators", .. }));
        assert!(err.to_string().contains("height 51"));
    }

    #[tokio::test]
    async fn test_invalid_validator_set_is_decode_error() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(3, validators(1, 10));
        chain.set_validators(3, validators(2, 0));

        let err = assembler(&chain, QueryConfig::default())
            .query_tendermint_header()
            .await
            .unwrap_err();

        assert!(err.is_decode());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_assembly_stops_querying() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        chain.produce_blocks(50, validators(2, 10));
        chain.set_latency(std::time::Duration::from_millis(50));

        let assembler = assembler(&chain, QueryConfig::at_height(50));
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            assembler.query_self_consensus_state(),
        )
        .await;

        assert!(result.is_err());
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(chain.calls(), vec![BackendCall::AbciInfo]);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let chain = Arc::new(MockChain::new("testchain-1"));
        let config = QueryConfig {
            validators_per_page: 0,
            ..Default::default()
        };

        assert!(matches!(
            ConsensusAssembler::new(chain, config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
