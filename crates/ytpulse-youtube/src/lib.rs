//! YouTube Data API v3 client for channel engagement analysis.
//!
//! Exposes exactly the three read operations the report pipeline needs
//! (channel lookup, latest-video search, video statistics) behind the
//! [`ChannelDataApi`] trait, plus the channel-identifier normalizer and
//! a generic retry decorator for transient failures.

mod client;
mod error;
mod normalize;
pub mod retry;
mod types;

pub use client::{ChannelDataApi, YoutubeClient};
pub use error::YoutubeError;
pub use normalize::{normalize_channel_id, CHANNEL_ID_PREFIX};
pub use types::{ChannelSummary, RawVideo};
