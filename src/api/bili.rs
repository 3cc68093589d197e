//! Remote resolver
//!
//! Turns video ids and part ids into metadata and playable stream URLs,
//! combining the request client with the stream-URL cache and the retry
//! policy.

use std::sync::Arc;

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use super::bili_api::{
    ApiClient, BiliApi, Endpoint, Identity, SearchResult, StreamCandidate, TrackRef,
    VideoMetadata, to_search_result, to_stream_candidate, to_video_metadata,
};
use super::error::ResolveError;
use super::retry::RetryPolicy;
use crate::cache::StreamUrlCache;
use crate::settings::Settings;

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^BV[0-9A-Za-z]{8,}$").unwrap();
}

/// Audio-capable DASH response with lossless streams when available
const FNVAL_DASH_ALL: &str = "4048";

/// Check that `video_id` has the `BV…` shape
pub fn validate_video_id(video_id: &str) -> Result<(), ResolveError> {
    if VIDEO_ID.is_match(video_id) {
        Ok(())
    } else {
        Err(ResolveError::InvalidInput(format!(
            "malformed video id {:?}",
            video_id
        )))
    }
}

/// Parse a video id and a textual part id into a `TrackRef`
pub fn parse_track_ref(video_id: &str, part_id: &str) -> Result<TrackRef, ResolveError> {
    validate_video_id(video_id)?;
    match part_id.trim().parse::<u64>() {
        Ok(cid) if cid > 0 => Ok(TrackRef::new(video_id, cid)),
        _ => Err(ResolveError::InvalidInput(format!(
            "part id must be a positive integer, got {:?}",
            part_id
        ))),
    }
}

/// Resolver over an `ApiClient`, defaulting to the real Bilibili client
///
/// Cloning is cheap; clones share the client and the cache.
pub struct BiliClient<C = BiliApi> {
    api: Arc<C>,
    cache: Arc<StreamUrlCache>,
    retry: RetryPolicy,
}

impl<C> Clone for BiliClient<C> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            cache: self.cache.clone(),
            retry: self.retry,
        }
    }
}

impl<C> std::fmt::Debug for BiliClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiliClient")
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .finish()
    }
}

impl BiliClient<BiliApi> {
    /// Build the real client from settings and the process identity
    pub fn from_settings(settings: &Settings, identity: Arc<Identity>) -> Result<Self> {
        let api = BiliApi::with_proxy(identity, settings.network.proxy_url())?;
        Ok(Self::with_api(
            api,
            StreamUrlCache::new(settings.cache.max_entries),
            RetryPolicy::from(&settings.retry),
        ))
    }
}

impl<C: ApiClient> BiliClient<C> {
    pub fn with_api(api: C, cache: StreamUrlCache, retry: RetryPolicy) -> Self {
        Self {
            api: Arc::new(api),
            cache: Arc::new(cache),
            retry,
        }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    pub fn cache(&self) -> &StreamUrlCache {
        &self.cache
    }

    /// Search videos by keyword
    ///
    /// A single request; failures, rate limiting included, surface
    /// immediately since the caller can simply search again.
    pub async fn search_videos(&self, keyword: &str, page: u32) -> Result<SearchResult, ResolveError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ResolveError::InvalidInput("empty search keyword".to_string()));
        }
        if page == 0 {
            return Err(ResolveError::InvalidInput("pages start at 1".to_string()));
        }

        let query = vec![
            ("search_type".to_string(), "video".to_string()),
            ("keyword".to_string(), keyword.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        let value = self.api.get(Endpoint::Search, query).await.into_result()?;

        let result = to_search_result(&value, page)
            .map_err(|e| ResolveError::Unexpected(format!("search payload: {:#}", e)))?;
        debug!(
            "Search {:?} page {}: {} of {} results",
            keyword,
            page,
            result.items.len(),
            result.total
        );
        Ok(result)
    }

    /// Fetch metadata for a video, retrying rate limits and network errors
    pub async fn get_video_info(&self, video_id: &str) -> Result<VideoMetadata, ResolveError> {
        validate_video_id(video_id)?;

        let label = format!("video info {}", video_id);
        let classified = self
            .retry
            .run(&label, || {
                self.api.get(
                    Endpoint::VideoInfo,
                    vec![("bvid".to_string(), video_id.to_string())],
                )
            })
            .await;
        let value = classified.into_result()?;

        match to_video_metadata(&value) {
            Ok(Some(meta)) => Ok(meta),
            Ok(None) => Err(ResolveError::NotFound(format!(
                "no video data for {}",
                video_id
            ))),
            Err(e) => Err(ResolveError::Unexpected(format!("video payload: {:#}", e))),
        }
    }

    /// Resolve playable audio URLs for one part of a video
    ///
    /// Served from the cache while fresh. Otherwise one request is made, with
    /// no retry: the caller falls back to backup URLs or asks again.
    pub async fn get_audio_url(
        &self,
        video_id: &str,
        part_id: &str,
    ) -> Result<StreamCandidate, ResolveError> {
        // Invalid ids can never have been cached, so validating first is safe
        let key = parse_track_ref(video_id, part_id)?;

        if let Some(candidate) = self.cache.get(&key) {
            debug!("Stream URL cache hit for {}", key);
            return Ok(candidate);
        }

        self.resolve_audio(key).await
    }

    /// Same as `get_audio_url` for a `TrackRef`
    pub async fn get_audio_url_for(&self, key: &TrackRef) -> Result<StreamCandidate, ResolveError> {
        self.get_audio_url(&key.video_id, &key.part_id.to_string())
            .await
    }

    async fn resolve_audio(&self, key: TrackRef) -> Result<StreamCandidate, ResolveError> {
        let query = vec![
            ("bvid".to_string(), key.video_id.clone()),
            ("cid".to_string(), key.part_id.to_string()),
            ("fnval".to_string(), FNVAL_DASH_ALL.to_string()),
            ("fourk".to_string(), "1".to_string()),
        ];
        let value = match self.api.get(Endpoint::PlayUrl, query).await.into_result() {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to resolve audio for {}: {}", key, e);
                return Err(e);
            }
        };

        let candidate = to_stream_candidate(&value).ok_or_else(|| {
            ResolveError::NotFound(format!("no playable audio stream for {}", key))
        })?;

        info!(
            "Resolved audio for {} ({} backup URLs)",
            key,
            candidate.backups().len()
        );
        self.cache.put(key, candidate.clone());
        Ok(candidate)
    }
}
