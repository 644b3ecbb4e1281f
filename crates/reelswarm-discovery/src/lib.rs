#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Content discovery across external torrent indexes.
//!
//! Layout: `provider.rs` (the [`IndexProvider`] seam), `yts.rs` and `json.rs`
//! (concrete providers), `normalize.rs` (lenient field extraction and quality
//! selection), `aggregator.rs` (concurrent fan-out with failure tolerance).

pub mod aggregator;
pub mod error;
pub mod json;
mod normalize;
pub mod provider;
pub mod yts;

pub use aggregator::ContentDiscoveryAggregator;
pub use error::{DiscoveryError, DiscoveryResult};
pub use json::JsonIndexProvider;
pub use normalize::QualityPreference;
pub use provider::{IndexProvider, build_http_client};
pub use yts::YtsProvider;
