//! Store entry diffing for client keys
//!
//! Renders two raw values stored under the same client key side by side,
//! decoded through the type registry, so state divergence between two runs
//! can be read by a person.

use crate::codec::{unpack_client_state, unpack_consensus_state, TypeRegistry};
use crate::host::{ClientStorePath, StoreKey};
use crate::{Error, Result};

/// Describe the difference between two store entries
///
/// Both keys must address the same client state or consensus state path.
/// Keys outside the client store, mismatched keys and undecodable values
/// are errors.
pub fn decode_store(registry: &TypeRegistry, kv_a: (&[u8], &[u8]), kv_b: (&[u8], &[u8])) -> Result<String> {
    let (key_a, value_a) = kv_a;
    let (key_b, value_b) = kv_b;

    let path = ClientStorePath::parse(key_a).ok_or_else(|| {
        Error::Decode(format!(
            "invalid client store key {}",
            StoreKey::new(key_a.to_vec())
        ))
    })?;

    if key_a != key_b {
        return Err(Error::Decode(format!(
            "store keys differ: {} vs {}",
            StoreKey::new(key_a.to_vec()),
            StoreKey::new(key_b.to_vec())
        )));
    }

    match path {
        ClientStorePath::ClientState { .. } => {
            let a = unpack_client_state(registry, value_a)?;
            let b = unpack_client_state(registry, value_b)?;
            Ok(format!("ClientState A: {a:?}\nClientState B: {b:?}"))
        }
        ClientStorePath::ConsensusState { .. } => {
            let a = unpack_consensus_state(registry, value_a)?;
            let b = unpack_consensus_state(registry, value_b)?;
            Ok(format!("ConsensusState A: {a:?}\nConsensusState B: {b:?}"))
        }
    }
}
