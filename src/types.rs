//! Consensus data returned by the chain: commits and validator sets

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Leaf domain separator for the validator set Merkle tree
const LEAF_PREFIX: u8 = 0x00;

/// Inner node domain separator for the validator set Merkle tree
const INNER_PREFIX: u8 = 0x01;

/// Point in time, stored as seconds and nanoseconds since the Unix epoch
///
/// The raw pair is kept as-is so that encoded states round-trip exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds since the epoch
    pub seconds: i64,

    /// Nanoseconds within the second
    pub nanos: u32,
}

impl Timestamp {
    /// Create a timestamp from its raw parts
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Current wall clock time
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Convert from a chrono date-time
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self {
            seconds: time.timestamp(),
            nanos: time.timestamp_subsec_nanos(),
        }
    }

    /// Convert to a chrono date-time, if the parts are in range
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanos).single()
    }

    /// Nanoseconds since the epoch, if representable
    pub fn unix_nanos(&self) -> Option<i128> {
        if self.nanos >= 1_000_000_000 {
            return None;
        }
        Some(self.seconds as i128 * 1_000_000_000 + self.nanos as i128)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_datetime(time)
    }
}

/// Validator vote included in a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSignature {
    /// Address of the signing validator
    pub validator_address: Vec<u8>,

    /// Time the vote was cast
    pub timestamp: Timestamp,

    /// Vote signature; empty when the validator was absent
    pub signature: Vec<u8>,
}

/// Authenticated summary of a produced block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    /// Chain the block belongs to
    pub chain_id: String,

    /// Block height
    pub height: i64,

    /// Block time
    pub time: Timestamp,

    /// Root hash of the application store after this block
    pub app_hash: Vec<u8>,

    /// Hash of the validator set that signed this block
    pub validators_hash: Vec<u8>,

    /// Hash of the validator set for the next block
    pub next_validators_hash: Vec<u8>,

    /// Votes committing the block
    pub signatures: Vec<CommitSignature>,
}

/// A consensus participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Validator address
    pub address: Vec<u8>,

    /// Consensus voting power
    pub voting_power: i64,

    /// Consensus public key
    pub pub_key: Vec<u8>,
}

impl Validator {
    /// Create a new validator
    pub fn new(address: impl Into<Vec<u8>>, voting_power: i64, pub_key: impl Into<Vec<u8>>) -> Self {
        Self {
            address: address.into(),
            voting_power,
            pub_key: pub_key.into(),
        }
    }

    /// Bytes hashed as this validator's leaf in the set hash
    ///
    /// Only the public key and voting power are committed to.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.pub_key.len() + 8);
        bytes.extend_from_slice(&(self.pub_key.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.pub_key);
        bytes.extend_from_slice(&self.voting_power.to_be_bytes());
        bytes
    }
}

/// Ordered set of validators at a height
///
/// Validators are sorted by voting power (descending), then by address
/// (ascending), so the same members always produce the same hash.
/// Serialized as the plain validator list; deserializing rebuilds the set
/// through [`ValidatorSet::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Validator>", into = "Vec<Validator>")]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_voting_power: i64,
}

impl ValidatorSet {
    /// Build a validator set, rejecting duplicates and non-positive power
    pub fn new(mut validators: Vec<Validator>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(validators.len());
        let mut total_voting_power: i64 = 0;

        for validator in &validators {
            if validator.voting_power <= 0 {
                return Err(Error::Decode(format!(
                    "validator {} has non-positive voting power {}",
                    hex::encode(&validator.address),
                    validator.voting_power
                )));
            }
            if !seen.insert(validator.address.as_slice()) {
                return Err(Error::Decode(format!(
                    "duplicate validator {}",
                    hex::encode(&validator.address)
                )));
            }
            total_voting_power = total_voting_power
                .checked_add(validator.voting_power)
                .ok_or_else(|| Error::Decode("total voting power overflows".to_string()))?;
        }

        validators.sort_by(|a, b| {
            b.voting_power
                .cmp(&a.voting_power)
                .then_with(|| a.address.cmp(&b.address))
        });

        Ok(Self {
            validators,
            total_voting_power,
        })
    }

    /// Validators in canonical order
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Number of validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set has no validators
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Sum of all voting power
    pub fn total_voting_power(&self) -> i64 {
        self.total_voting_power
    }

    /// Merkle root over the ordered validators
    pub fn hash(&self) -> Vec<u8> {
        let leaves: Vec<Vec<u8>> = self.validators.iter().map(Validator::hash_bytes).collect();
        merkle_root(&leaves)
    }
}

impl TryFrom<Vec<Validator>> for ValidatorSet {
    type Error = Error;

    fn try_from(validators: Vec<Validator>) -> Result<Self> {
        Self::new(validators)
    }
}

impl From<ValidatorSet> for Vec<Validator> {
    fn from(set: ValidatorSet) -> Self {
        set.validators
    }
}

/// One page of a validator query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPage {
    /// Height the validators are for
    pub block_height: i64,

    /// Validators on this page
    pub validators: Vec<Validator>,

    /// Total number of validators at this height
    pub total: usize,
}

/// RFC 6962 style SHA-256 Merkle root
///
/// The tree splits at the largest power of two strictly below the number
/// of leaves. An empty list hashes to `SHA-256("")`.
pub fn merkle_root(leaves: &[Vec<u8>]) -> Vec<u8> {
    match leaves.len() {
        0 => Sha256::digest(b"").to_vec(),
        1 => leaf_hash(&leaves[0]),
        n => {
            let split = split_point(n);
            let left = merkle_root(&leaves[..split]);
            let right = merkle_root(&leaves[split..]);
            inner_hash(&left, &right)
        }
    }
}

fn leaf_hash(leaf: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf);
    hasher.finalize().to_vec()
}

fn inner_hash(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update([INNER_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}

/// Largest power of two strictly less than `n` (for `n >= 2`)
fn split_point(n: usize) -> usize {
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}
