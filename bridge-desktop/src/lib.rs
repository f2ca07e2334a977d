//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `MediaDownloader` using `reqwest`, streaming into the system temp
//!   directory with `tokio::fs`
//!
//! Record, taxonomy and asset storage are always host specific and have no
//! desktop default.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestMediaDownloader;
//! use std::sync::Arc;
//!
//! let downloader = ReqwestMediaDownloader::new()?;
//! let config = CoreConfig::builder()
//!     .media_downloader(Arc::new(downloader))
//!     // ...
//!     .build()?;
//! ```

mod http;

pub use http::{DownloadRetryPolicy, ReqwestMediaDownloader};
