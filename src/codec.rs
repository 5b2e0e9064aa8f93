//! Polymorphic light client state encoding
//!
//! Client and consensus states are stored as a [`PackedState`]: a type
//! identifier plus the encoded concrete state. Decoding goes through a
//! [`TypeRegistry`] mapping type identifiers to decode functions. The
//! registry is built once, never mutated afterwards, and handed explicitly
//! to whatever needs to decode.
//!
//! Encoding is canonical (fixed-width integers, trailing bytes rejected),
//! so packing an unpacked state reproduces the stored bytes exactly.

use crate::{solomachine, tendermint};
use crate::{Error, Result};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Family of light client state stored under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    ClientState,
    ConsensusState,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::ClientState => f.write_str("client state"),
            StateKind::ConsensusState => f.write_str("consensus state"),
        }
    }
}

/// Self-describing encoded state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedState {
    /// Type identifier of the encoded state
    pub type_url: String,

    /// Canonical encoding of the concrete state
    pub value: Vec<u8>,
}

impl PackedState {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// Encode the envelope as stored in the store
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// Decode an envelope read from the store
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

/// Any client state known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyClientState {
    Tendermint(tendermint::ClientState),
    SoloMachine(solomachine::ClientState),
}

impl AnyClientState {
    /// Type identifier of the concrete variant
    pub fn type_url(&self) -> &'static str {
        match self {
            AnyClientState::Tendermint(_) => tendermint::TENDERMINT_CLIENT_STATE_TYPE_URL,
            AnyClientState::SoloMachine(_) => solomachine::SOLOMACHINE_CLIENT_STATE_TYPE_URL,
        }
    }

    /// Pack into a self-describing envelope
    pub fn pack(&self) -> Result<PackedState> {
        let value = match self {
            AnyClientState::Tendermint(state) => encode(state)?,
            AnyClientState::SoloMachine(state) => encode(state)?,
        };
        Ok(PackedState::new(self.type_url(), value))
    }
}

impl From<tendermint::ClientState> for AnyClientState {
    fn from(state: tendermint::ClientState) -> Self {
        AnyClientState::Tendermint(state)
    }
}

impl From<solomachine::ClientState> for AnyClientState {
    fn from(state: solomachine::ClientState) -> Self {
        AnyClientState::SoloMachine(state)
    }
}

/// Any consensus state known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyConsensusState {
    Tendermint(tendermint::ConsensusState),
    SoloMachine(solomachine::ConsensusState),
}

impl AnyConsensusState {
    /// Type identifier of the concrete variant
    pub fn type_url(&self) -> &'static str {
        match self {
            AnyConsensusState::Tendermint(_) => tendermint::TENDERMINT_CONSENSUS_STATE_TYPE_URL,
            AnyConsensusState::SoloMachine(_) => solomachine::SOLOMACHINE_CONSENSUS_STATE_TYPE_URL,
        }
    }

    /// Pack into a self-describing envelope
    pub fn pack(&self) -> Result<PackedState> {
        let value = match self {
            AnyConsensusState::Tendermint(state) => encode(state)?,
            AnyConsensusState::SoloMachine(state) => encode(state)?,
        };
        Ok(PackedState::new(self.type_url(), value))
    }
}

impl From<tendermint::ConsensusState> for AnyConsensusState {
    fn from(state: tendermint::ConsensusState) -> Self {
        AnyConsensusState::Tendermint(state)
    }
}

impl From<solomachine::ConsensusState> for AnyConsensusState {
    fn from(state: solomachine::ConsensusState) -> Self {
        AnyConsensusState::SoloMachine(state)
    }
}

/// Decodes a client state payload
pub type ClientStateDecoder = fn(&[u8]) -> Result<AnyClientState>;

/// Decodes a consensus state payload
pub type ConsensusStateDecoder = fn(&[u8]) -> Result<AnyConsensusState>;

/// Immutable map from type identifier to decode function
#[derive(Clone, Default)]
pub struct TypeRegistry {
    client_states: HashMap<String, ClientStateDecoder>,
    consensus_states: HashMap<String, ConsensusStateDecoder>,
}

impl TypeRegistry {
    /// Start building a registry
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Registry with every state type this crate defines
    pub fn with_default_types() -> Self {
        Self::builder()
            .register_client_state(tendermint::TENDERMINT_CLIENT_STATE_TYPE_URL, |bytes| {
                decode::<tendermint::ClientState>(bytes).map(AnyClientState::Tendermint)
            })
            .register_client_state(solomachine::SOLOMACHINE_CLIENT_STATE_TYPE_URL, |bytes| {
                decode::<solomachine::ClientState>(bytes).map(AnyClientState::SoloMachine)
            })
            .register_consensus_state(tendermint::TENDERMINT_CONSENSUS_STATE_TYPE_URL, |bytes| {
                decode::<tendermint::ConsensusState>(bytes).map(AnyConsensusState::Tendermint)
            })
            .register_consensus_state(solomachine::SOLOMACHINE_CONSENSUS_STATE_TYPE_URL, |bytes| {
                decode::<solomachine::ConsensusState>(bytes).map(AnyConsensusState::SoloMachine)
            })
            .build()
    }

    /// Shared handle for passing to query components
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// State family a type identifier is registered under
    pub fn kind_of(&self, type_url: &str) -> Option<StateKind> {
        if self.client_states.contains_key(type_url) {
            Some(StateKind::ClientState)
        } else if self.consensus_states.contains_key(type_url) {
            Some(StateKind::ConsensusState)
        } else {
            None
        }
    }

    /// Registered client state type identifiers
    pub fn client_state_types(&self) -> impl Iterator<Item = &str> {
        self.client_states.keys().map(String::as_str)
    }

    /// Registered consensus state type identifiers
    pub fn consensus_state_types(&self) -> impl Iterator<Item = &str> {
        self.consensus_states.keys().map(String::as_str)
    }

    /// Decode a packed client state
    pub fn unpack_client_state(&self, packed: &PackedState) -> Result<AnyClientState> {
        let decoder = self.client_states.get(&packed.type_url).ok_or_else(|| {
            Error::Decode(self.unknown_type_message(&packed.type_url, StateKind::ClientState))
        })?;

        let state = decoder(&packed.value)?;
        check_variant(&packed.type_url, state.type_url())?;

        trace!("Decoded client state of type {}", packed.type_url);
        Ok(state)
    }

    /// Decode a packed consensus state
    pub fn unpack_consensus_state(&self, packed: &PackedState) -> Result<AnyConsensusState> {
        let decoder = self.consensus_states.get(&packed.type_url).ok_or_else(|| {
            Error::Decode(self.unknown_type_message(&packed.type_url, StateKind::ConsensusState))
        })?;

        let state = decoder(&packed.value)?;
        check_variant(&packed.type_url, state.type_url())?;

        trace!("Decoded consensus state of type {}", packed.type_url);
        Ok(state)
    }

    fn unknown_type_message(&self, type_url: &str, expected: StateKind) -> String {
        match self.kind_of(type_url) {
            Some(actual) => format!("type {type_url:?} is a {actual}, expected a {expected}"),
            None if type_url.is_empty() => format!("empty type identifier for {expected}"),
            None => format!("unknown {expected} type {type_url:?}"),
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("client_states", &self.client_states.keys().collect::<Vec<_>>())
            .field("consensus_states", &self.consensus_states.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`TypeRegistry`]
#[derive(Default)]
pub struct TypeRegistryBuilder {
    client_states: HashMap<String, ClientStateDecoder>,
    consensus_states: HashMap<String, ConsensusStateDecoder>,
}

impl TypeRegistryBuilder {
    /// Register a client state decoder
    ///
    /// The decoder must produce the variant whose `type_url()` equals
    /// `type_url`; unpacking rejects any mismatch.
    pub fn register_client_state(mut self, type_url: &str, decoder: ClientStateDecoder) -> Self {
        self.client_states.insert(type_url.to_string(), decoder);
        self
    }

    /// Register a consensus state decoder
    pub fn register_consensus_state(mut self, type_url: &str, decoder: ConsensusStateDecoder) -> Self {
        self.consensus_states.insert(type_url.to_string(), decoder);
        self
    }

    /// Freeze the registry
    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            client_states: self.client_states,
            consensus_states: self.consensus_states,
        }
    }
}

/// Decode a stored client state value
pub fn unpack_client_state(registry: &TypeRegistry, bytes: &[u8]) -> Result<AnyClientState> {
    registry.unpack_client_state(&PackedState::decode(bytes)?)
}

/// Decode a stored consensus state value
pub fn unpack_consensus_state(registry: &TypeRegistry, bytes: &[u8]) -> Result<AnyConsensusState> {
    registry.unpack_consensus_state(&PackedState::decode(bytes)?)
}

fn check_variant(expected: &str, actual: &str) -> Result<()> {
    if expected != actual {
        return Err(Error::Decode(format!(
            "decoder for {expected:?} produced a {actual:?}"
        )));
    }
    Ok(())
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Canonical encoding of a state value
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(options().serialize(value)?)
}

/// Strict decoding of a state value
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    options()
        .deserialize(bytes)
        .map_err(|e| Error::Decode(e.to_string()))
}
