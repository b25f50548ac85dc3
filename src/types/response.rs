use serde::Deserialize;
use serde_json::{Map, Value};

use crate::asset_id::AssetId;

/// A pushed `event` payload, discriminated by its `type` field.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PylonEvent {
    Balances(BalanceEvent),
    Inventory(InventoryEvent),
    Tokens(TokenEvent),
    Rates(RatesEvent),
}

/// Which account a paged event belongs to and whether more pages follow.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountMeta {
    pub account: String,
    /// `false` while the server is still scanning; later pages follow
    pub finished: bool,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BalanceEvent {
    pub meta: AccountMeta,
    pub data: Vec<Balance>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub contract: String,
    pub chain_id: u64,
    /// Raw integer amount as a decimal or hex string
    pub amount: String,
}

/// Collectible contracts held by an account.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InventoryEvent {
    pub meta: AccountMeta,
    pub data: Vec<String>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenEvent {
    #[serde(default)]
    pub meta: Map<String, Value>,
    pub data: Vec<Token>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub contract: String,
    pub chain_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub media: Media,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub hide_by_default: bool,
}

#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub format: MediaFormat,
    #[serde(default)]
    pub cdn: Cdn,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Video,
    Image,
    #[default]
    Unknown,
    /// The server sends an empty string when it has not classified the media yet
    #[serde(rename = "")]
    Unset,
}

/// Cached renditions of a token's media.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Cdn {
    pub main: Option<String>,
    pub thumb: Option<String>,
    pub frozen: Option<String>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RatesEvent {
    pub data: Vec<Rate>,
}

/// Price data for one asset. The shape of `data` is owned by the server.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rate {
    pub id: AssetId,
    pub data: Value,
}
