#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod asset_id;
pub mod client;
pub mod error;
pub(crate) mod serde_helpers;
pub mod subscription;
pub mod types;
pub mod ws;

pub use asset_id::{AssetId, AssetType};
pub use client::Client;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
