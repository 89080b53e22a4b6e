//! Binance data provider
//!
//! Two collaborators feed the ingestion core:
//! - `bulk` - monthly/daily ZIP kline files from the Vision CDN, with
//!   automatic monthly→daily fallback and coverage accounting
//! - `rest` - live klines REST API used to backfill detected gaps in
//!   API-limit-sized chunks
//! - `checksum` - SHA-256 sidecar verification for CDN downloads
//!
//! ## Data Sources
//!
//! - **Bulk CDN**: <https://data.binance.vision/> (spot and UM futures paths)
//! - **Spot REST**: `api.binance.com`, **Futures REST**: `fapi.binance.com`

pub mod bulk;
pub mod checksum;
pub mod rest;
