//! Asset identifiers in their CAIP-19 style string form.
//!
//! ```text
//! eip155:1/slip44:60                                          native currency
//! eip155:137/erc20:0x2791bca1f2de4661ed88a30c99a7a9449aa84174 token
//! ```

use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::Error;

/// SLIP-44 coin type of Ether; the only native currency the server tracks.
const ETHER_COIN_TYPE: &str = "60";

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    NativeCurrency,
    Token,
}

/// An asset on an EVM chain.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum AssetId {
    NativeCurrency { chain_id: u64 },
    /// Addresses are kept lowercase
    Token { chain_id: u64, address: String },
}

impl AssetId {
    #[must_use]
    pub const fn native(chain_id: u64) -> Self {
        Self::NativeCurrency { chain_id }
    }

    #[must_use]
    pub fn token(chain_id: u64, address: &str) -> Self {
        Self::Token {
            chain_id,
            address: address.to_lowercase(),
        }
    }

    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        match self {
            Self::NativeCurrency { chain_id } | Self::Token { chain_id, .. } => *chain_id,
        }
    }

    #[must_use]
    pub const fn asset_type(&self) -> AssetType {
        match self {
            Self::NativeCurrency { .. } => AssetType::NativeCurrency,
            Self::Token { .. } => AssetType::Token,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NativeCurrency { chain_id } => {
                write!(f, "eip155:{chain_id}/slip44:{ETHER_COIN_TYPE}")
            }
            Self::Token { chain_id, address } => write!(f, "eip155:{chain_id}/erc20:{address}"),
        }
    }
}

impl FromStr for AssetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chain_id = None;
        let mut coin_type = None;
        let mut token = None;

        for segment in s.split('/') {
            let (namespace, reference) = segment.split_once(':').unwrap_or((segment, ""));
            match namespace {
                "eip155" => chain_id = Some(reference),
                "slip44" => coin_type = Some(reference),
                "erc20" => token = Some(reference),
                _ => {}
            }
        }

        let chain_id = chain_id
            .and_then(|reference| reference.parse::<u64>().ok())
            .filter(|chain_id| *chain_id != 0)
            .ok_or_else(|| {
                Error::validation(format!("asset id {s} has an invalid eip155 chain id"))
            })?;

        if let Some(coin_type) = coin_type {
            if coin_type != ETHER_COIN_TYPE {
                return Err(Error::validation(format!(
                    "asset id {s} is not an Ethereum native currency"
                )));
            }
            return Ok(Self::native(chain_id));
        }

        match token {
            Some(address) => Ok(Self::token(chain_id, address)),
            None => Err(Error::validation(format!(
                "asset id {s} has unknown namespaces"
            ))),
        }
    }
}
