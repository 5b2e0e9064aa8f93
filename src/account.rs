//! Interchain accounts
//!
//! An interchain account is a base account controlled from a counterparty
//! chain. Its public key and sequence are never set locally, and its owner
//! address is fixed at creation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted length of an account address
pub const DEFAULT_MAX_ADDR_LENGTH: usize = 128;

/// Plain account record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    /// Account address
    pub address: String,

    /// Public key, if one was ever set
    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<Vec<u8>>,

    /// Account number assigned at creation
    pub account_number: u64,

    /// Number of transactions sent
    pub sequence: u64,
}

impl BaseAccount {
    /// Fresh account for `address`
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Check the account fields
    pub fn validate(&self) -> Result<()> {
        validate_account_address(&self.address)
    }
}

/// Account owned and driven by a controller on another chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchainAccount {
    /// Underlying account
    #[serde(flatten)]
    pub base_account: BaseAccount,

    /// Controller address that owns the account
    pub account_owner: String,
}

impl InterchainAccount {
    /// Wrap `base_account` as an interchain account owned by `account_owner`
    pub fn new(base_account: BaseAccount, account_owner: impl Into<String>) -> Self {
        Self {
            base_account,
            account_owner: account_owner.into(),
        }
    }

    /// Account address
    pub fn address(&self) -> &str {
        &self.base_account.address
    }

    /// Always fails: the key belongs to the controller
    pub fn set_pub_key(&mut self, _pub_key: Vec<u8>) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "not allowed to set public key for interchain account".to_string(),
        ))
    }

    /// Always fails: the sequence belongs to the controller
    pub fn set_sequence(&mut self, _sequence: u64) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "not allowed to set sequence number for interchain account".to_string(),
        ))
    }

    /// Check the owner and the base account
    pub fn validate(&self) -> Result<()> {
        validate_account_address(&self.account_owner)?;
        self.base_account.validate()
    }

    /// Serialize as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for InterchainAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address: {} account_number: {} sequence: {} account_owner: {}",
            self.base_account.address,
            self.base_account.account_number,
            self.base_account.sequence,
            self.account_owner
        )
    }
}

/// Check that an address is non-blank and at most [`DEFAULT_MAX_ADDR_LENGTH`] long
pub fn validate_account_address(address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(Error::InvalidAccount(
            "invalid account address: empty or blank".to_string(),
        ));
    }

    if address.len() > DEFAULT_MAX_ADDR_LENGTH {
        return Err(Error::InvalidAccount(format!(
            "invalid account address: length {} exceeds maximum {}",
            address.len(),
            DEFAULT_MAX_ADDR_LENGTH
        )));
    }

    Ok(())
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        value
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "cosmos17dtl0mjt3t77kpuhg2edqzjpszulwhgzuj9ljs";

    fn account() -> InterchainAccount {
        InterchainAccount::new(BaseAccount::with_address("cosmos1hostaccount"), OWNER)
    }

    #[test]
    fn test_validate_account_address() {
        assert!(validate_account_address(OWNER).is_ok());
        assert!(validate_account_address("a").is_ok());
        assert!(validate_account_address(&"a".repeat(DEFAULT_MAX_ADDR_LENGTH)).is_ok());

        for bad in ["", "     ", &"a".repeat(DEFAULT_MAX_ADDR_LENGTH + 1)] {
            assert!(matches!(
                validate_account_address(bad),
                Err(Error::InvalidAccount(_))
            ));
        }
    }

    #[test]
    fn test_interchain_account_is_immutable() {
        let mut acc = account();

        assert!(matches!(
            acc.set_pub_key(vec![1; 33]),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(matches!(acc.set_sequence(1), Err(Error::UnsupportedOperation(_))));
        assert_eq!(acc, account());
    }

    #[test]
    fn test_interchain_account_validate() {
        assert!(account().validate().is_ok());

        let no_owner = InterchainAccount::new(BaseAccount::with_address("cosmos1host"), "");
        assert!(matches!(no_owner.validate(), Err(Error::InvalidAccount(_))));

        let no_address = InterchainAccount::new(BaseAccount::default(), OWNER);
        assert!(matches!(no_address.validate(), Err(Error::InvalidAccount(_))));
    }

    #[test]
    fn test_interchain_account_json() {
        let acc = account();
        let json = acc.to_json().unwrap();

        assert!(json.contains("\"account_owner\""));
        assert!(!json.contains("pub_key"));
        assert_eq!(InterchainAccount::from_json(&json).unwrap(), acc);
        assert_eq!(serde_json::to_string(&acc).unwrap(), json);

        let mut with_key = acc;
        with_key.base_account.pub_key = Some(vec![0xab, 0xcd]);
        let json = with_key.to_json().unwrap();
        assert!(json.contains("\"abcd\""));
        assert_eq!(InterchainAccount::from_json(&json).unwrap(), with_key);
    }
}
