//! # IBC Client Query
//!
//! Query layer for IBC light clients: reads client and consensus states
//! from a chain, with or without Merkle proofs, and assembles the headers
//! and self consensus states a counterparty needs to create or update a
//! client of this chain.
//!
//! ## Features
//!
//! - Proven and unproven client / consensus state queries
//! - Self-describing state envelopes decoded through a type registry
//! - Header and self consensus state assembly from commits and validator sets
//! - Interchain account restrictions and a store entry decoder
//!
//! ## Architecture
//!
//! 1. A [`backend::ChainQueryBackend`] provides store reads with proofs,
//!    commits and validator sets; a [`backend::ClientQueryService`] answers
//!    plain client queries
//! 2. The [`router::ProofQueryRouter`] picks the proven or unproven path
//! 3. The [`assembler::ConsensusAssembler`] resolves a height and combines a
//!    commit with a validator set
//! 4. The [`codec::TypeRegistry`] turns stored bytes into typed states

#![warn(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]
#![allow(missing_docs)] // Internal implementation details

pub mod account;
pub mod assembler;
pub mod backend;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod height;
pub mod host;
pub mod mock;
pub mod router;
pub mod simulation;
pub mod solomachine;
pub mod tendermint;
pub mod types;

pub use account::{validate_account_address, BaseAccount, InterchainAccount, DEFAULT_MAX_ADDR_LENGTH};
pub use assembler::ConsensusAssembler;
pub use backend::{BackendResult, ChainQueryBackend, ClientQueryService, ProofQueryResult};
pub use client::QueryClient;
pub use codec::{AnyClientState, AnyConsensusState, PackedState, StateKind, TypeRegistry, TypeRegistryBuilder};
pub use config::{QueryConfig, DEFAULT_VALIDATORS_PER_PAGE};
pub use error::{BoxError, Error, Result};
pub use height::{resolve_block_height, Height};
pub use host::{client_state_key, consensus_state_key, ClientStorePath, StoreKey};
pub use router::{ClientStateResponse, ConsensusStateResponse, ProofQueryRouter};
pub use simulation::decode_store;
pub use types::{CommitData, Timestamp, Validator, ValidatorPage, ValidatorSet};
