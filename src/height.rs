//! Revision-aware heights and effective height resolution
//!
//! A height is a `(revision_number, revision_height)` pair. The revision
//! number increments on chain upgrades that reset the block counter, so
//! ordering is lexicographic on the pair. The zero height is the "unset"
//! sentinel: callers pass it to mean "use the latest height".

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Height of a chain, tagged with its revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Height {
    /// Revision (upgrade epoch) of the chain
    pub revision_number: u64,

    /// Block height within the revision
    pub revision_height: u64,
}

impl Height {
    /// Create a new height
    pub const fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }

    /// The unset sentinel
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Whether this is the unset sentinel
    pub fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }

    /// Resolve the height to query from a requested height and the latest one
    ///
    /// An unset request resolves to `latest`. Any explicit height is returned
    /// unchanged, including heights above `latest`.
    pub fn resolve(requested: Height, latest: Height) -> Height {
        if requested.is_zero() {
            latest
        } else {
            requested
        }
    }

    /// Build a height from a block height, taking the revision from the chain id
    pub fn from_chain_id(chain_id: &str, block_height: u64) -> Self {
        Self::new(parse_chain_id_revision(chain_id), block_height)
    }

    /// Height directly after this one within the same revision
    pub fn increment(self) -> Self {
        Self::new(self.revision_number, self.revision_height.saturating_add(1))
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

impl FromStr for Height {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (number, height) = s
            .split_once('-')
            .ok_or_else(|| Error::Decode(format!("height {s:?} is not in {{revision}}-{{height}} format")))?;

        let revision_number = number
            .parse::<u64>()
            .map_err(|e| Error::Decode(format!("invalid revision number in {s:?}: {e}")))?;
        let revision_height = height
            .parse::<u64>()
            .map_err(|e| Error::Decode(format!("invalid revision height in {s:?}: {e}")))?;

        Ok(Self::new(revision_number, revision_height))
    }
}

/// Resolve a raw block height, where `0` means "latest"
pub fn resolve_block_height(requested: i64, latest: i64) -> i64 {
    if requested != 0 {
        requested
    } else {
        latest
    }
}

/// Revision number encoded in a chain id of the form `{name}-{revision}`
///
/// Chain ids without a numeric suffix (or with a leading zero in it) belong
/// to revision 0.
pub fn parse_chain_id_revision(chain_id: &str) -> u64 {
    let Some((name, revision)) = chain_id.rsplit_once('-') else {
        return 0;
    };

    if name.is_empty() || revision.is_empty() || (revision.len() > 1 && revision.starts_with('0')) {
        return 0;
    }

    revision.parse::<u64>().unwrap_or(0)
}
