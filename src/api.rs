//! Bilibili API module
//!
//! Provides the request client with synthetic identity and WBI signing,
//! the retrying, caching resolver built on it, and the failure taxonomy.

mod bili;
pub mod bili_api;
mod error;
mod retry;

pub use bili::{BiliClient, parse_track_ref, validate_video_id};
pub use bili_api::{
    ApiClient, BiliApi, Classified, Endpoint, Identity, Part, SearchResult, StreamCandidate,
    TrackRef, VideoMetadata, VideoSummary,
};
pub use error::{ResolveError, UserHint};
pub use retry::RetryPolicy;
