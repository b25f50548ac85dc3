use bon::Builder;
use serde::Serialize;

/// Transaction to dry-run with `simulateTransaction`.
///
/// Quantities and calldata are `0x`-prefixed hex strings, passed through to
/// the server untouched.
///
/// # Example
///
/// ```
/// use pylon_client::types::Transaction;
///
/// let tx = Transaction::builder()
///     .chain_id(1)
///     .from("0x1234".to_owned())
///     .to("0xabcd".to_owned())
///     .value("0x0".to_owned())
///     .build();
/// ```
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    #[builder(default = "0x0".to_owned())]
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
}
