//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A 20-byte blockchain address, identifying a Node on the L2 staking contract.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; 20]);

#[derive(Debug, thiserror::Error)]
pub enum AddressParseError {
    #[error("address must be 20 bytes, got {0}")]
    WrongLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form, matching the cache key convention
    /// `InvalidRequestCount:<0xADDR>` / `ValidRequestCount:<0xADDR>` bit-exactly.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        let len = bytes.len();
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| AddressParseError::WrongLength(len))?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let addr = Address::new([0xab; 20]);
        let hex = addr.to_hex();
        assert_eq!(hex, format!("0x{}", "ab".repeat(20)));
        assert_eq!(hex.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("0xabcd".parse::<Address>().is_err());
    }
}
