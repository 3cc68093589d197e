//! Bilisound - media resource resolution for a Bilibili audio player
//!
//! Two halves feed the player:
//! - [`api`]: turns video ids into metadata and short-lived stream URLs,
//!   with a synthetic browser identity, WBI signing, retry and a TTL cache
//! - [`server`]: a loopback HTTP server that streams local files with
//!   byte-range support so the player can seek

pub mod api;
pub mod cache;
pub mod server;
pub mod settings;
pub mod utils;

pub use api::{BiliClient, Identity, ResolveError, StreamCandidate, TrackRef};
pub use cache::StreamUrlCache;
pub use server::{LocalFileServer, stream_local_file};
pub use settings::Settings;
