//! Bilibili API model types
//!
//! Data structures for API responses and the parsers that build them.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::{clean_title, normalize_cover_url, parse_duration};

trait DeVal<'a>: Sized {
    fn dval(v: &'a Value) -> Result<Self>;
}

impl<'a> DeVal<'a> for i64 {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for u64 {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for u32 {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for String {
    fn dval(v: &Value) -> Result<Self> {
        Ok(Self::deserialize(v)?)
    }
}

impl<'a> DeVal<'a> for &'a Vec<Value> {
    fn dval(v: &'a Value) -> Result<Self> {
        match v {
            Value::Array(v) => Ok(v),
            _ => Err(anyhow!("json not a array")),
        }
    }
}

impl<'a> DeVal<'a> for &'a Value {
    fn dval(v: &'a Value) -> Result<Self> {
        Ok(v)
    }
}

fn get_val_chain<'a, T>(v: &'a Value, names: &[&str]) -> Result<T>
where
    T: DeVal<'a>,
{
    let v = names.iter().try_fold(v, |v, n| {
        v.get(n)
            .ok_or_else(|| anyhow!("key '{}' not found, in chain {:?}", n, names))
    })?;
    T::dval(v)
}

macro_rules! get_val {
    (@as $t:ty, $v:expr, $($n:expr),+) => {
        get_val_chain::<$t>($v, &[$($n),+]).context(format!("at {}:{}", file!(), line!()))
    };
    ($v:expr, $($n:expr),+) => {
        get_val_chain($v, &[$($n),+]).context(format!("at {}:{}", file!(), line!()))
    };
}

/// Identifies one playable part of a remote video
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRef {
    /// Video id (`BV…`)
    pub video_id: String,
    /// Part id (`cid`), always positive
    pub part_id: u64,
}

impl TrackRef {
    pub fn new(video_id: impl Into<String>, part_id: u64) -> Self {
        Self {
            video_id: video_id.into(),
            part_id,
        }
    }
}

impl std::fmt::Display for TrackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.video_id, self.part_id)
    }
}

/// Ordered, never-empty list of equivalent playable URLs for one track
///
/// The first URL is preferred; the rest are backups to try in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCandidate {
    urls: Vec<String>,
}

impl StreamCandidate {
    /// Build a candidate from a primary URL and its backups
    ///
    /// Empty and duplicate URLs are dropped. Returns `None` when nothing
    /// usable is left.
    pub fn new<I>(primary: Option<String>, backups: I) -> Option<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut urls: Vec<String> = Vec::new();
        for url in primary.into_iter().chain(backups) {
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
        if urls.is_empty() {
            None
        } else {
            Some(Self { urls })
        }
    }

    pub fn primary(&self) -> &str {
        &self.urls[0]
    }

    pub fn backups(&self) -> &[String] {
        &self.urls[1..]
    }

    /// All URLs in preference order
    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

/// One part of a multi-part video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Part id (`cid`)
    pub part_id: u64,
    /// 1-based position in the video
    pub index: u32,
    pub label: String,
    /// Duration in seconds
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub cover_url: String,
    /// Part played when the caller does not pick one
    pub default_part_id: u64,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub aid: u64,
    pub title: String,
    pub author: String,
    pub cover_url: String,
    /// Duration in seconds (0 when the API omits it)
    pub duration: u64,
    pub play_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<VideoSummary>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Build `VideoMetadata` from a `/x/web-interface/view` payload
///
/// Returns `Ok(None)` when the payload carries no video.
pub fn to_video_metadata(value: &Value) -> Result<Option<VideoMetadata>> {
    let data: &Value = match value.get("data") {
        Some(d) if d.is_object() => d,
        _ => return Ok(None),
    };

    let empty = vec![];
    let pages: &Vec<Value> = get_val!(data, "pages").unwrap_or(&empty);
    let mut parts = Vec::with_capacity(pages.len());
    for (i, p) in pages.iter().enumerate() {
        parts.push(Part {
            part_id: get_val!(p, "cid")?,
            index: get_val!(p, "page").unwrap_or(i as u32 + 1),
            label: clean_title(&get_val!(@as String, p, "part").unwrap_or_default()),
            duration: get_val!(p, "duration").unwrap_or(0),
        });
    }

    let default_part_id = match get_val!(@as u64, data, "cid") {
        Ok(cid) => cid,
        Err(_) => match parts.first() {
            Some(p) => p.part_id,
            None => return Ok(None),
        },
    };

    Ok(Some(VideoMetadata {
        video_id: get_val!(data, "bvid")?,
        title: clean_title(&get_val!(@as String, data, "title")?),
        cover_url: normalize_cover_url(&get_val!(@as String, data, "pic").unwrap_or_default()),
        default_part_id,
        parts,
    }))
}

/// Build a `SearchResult` from a `/x/web-interface/wbi/search/type` payload
pub fn to_search_result(value: &Value, page: u32) -> Result<SearchResult> {
    let data: &Value = get_val!(value, "data")?;

    let empty = vec![];
    // `result` is absent when nothing matched
    let array: &Vec<Value> = get_val!(data, "result").unwrap_or(&empty);

    let mut items = Vec::with_capacity(array.len());
    for v in array.iter() {
        let duration = match v.get("duration") {
            Some(Value::String(s)) => parse_duration(s).unwrap_or(0),
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        };
        items.push(VideoSummary {
            video_id: get_val!(v, "bvid")?,
            aid: get_val!(v, "aid").unwrap_or(0),
            title: clean_title(&get_val!(@as String, v, "title")?),
            author: get_val!(v, "author").unwrap_or_default(),
            cover_url: normalize_cover_url(&get_val!(@as String, v, "pic").unwrap_or_default()),
            duration,
            play_count: get_val!(v, "play").unwrap_or(0),
        });
    }

    Ok(SearchResult {
        total: get_val!(data, "numResults").unwrap_or(items.len() as u64),
        page: get_val!(data, "page").unwrap_or(page),
        page_size: get_val!(data, "pagesize").unwrap_or(items.len() as u32),
        items,
    })
}

fn string_list(v: &Value, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .find_map(|n| v.get(*n).and_then(|x| x.as_array()))
        .map(|arr| {
            arr.iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn first_string(v: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| v.get(*n).and_then(|x| x.as_str()))
        .map(str::to_string)
}

fn dash_candidate(stream: &Value) -> Option<StreamCandidate> {
    StreamCandidate::new(
        first_string(stream, &["baseUrl", "base_url"]),
        string_list(stream, &["backupUrl", "backup_url"]),
    )
}

/// Build a `StreamCandidate` from a `/x/player/wbi/playurl` payload
///
/// Preference: lossless FLAC stream, then the DASH audio stream with the
/// highest bandwidth, then the first progressive (`durl`) stream.
/// Returns `None` when the payload offers no usable URL.
pub fn to_stream_candidate(value: &Value) -> Option<StreamCandidate> {
    let data = value.get("data")?;

    if let Some(dash) = data.get("dash") {
        if let Some(candidate) = dash
            .get("flac")
            .and_then(|f| f.get("audio"))
            .filter(|a| a.is_object())
            .and_then(dash_candidate)
        {
            return Some(candidate);
        }

        if let Some(audio) = dash.get("audio").and_then(|a| a.as_array()) {
            let mut streams: Vec<&Value> = audio.iter().collect();
            streams.sort_by_key(|s| {
                std::cmp::Reverse(s.get("bandwidth").and_then(|b| b.as_u64()).unwrap_or(0))
            });
            if let Some(candidate) = streams.into_iter().find_map(dash_candidate) {
                return Some(candidate);
            }
        }
    }

    data.get("durl")
        .and_then(|d| d.as_array())
        .and_then(|arr| {
            arr.iter().find_map(|d| {
                StreamCandidate::new(
                    first_string(d, &["url"]),
                    string_list(d, &["backup_url", "backupUrl"]),
                )
            })
        })
}

/// Extract the WBI image keys from a `/x/web-interface/nav` payload
///
/// The keys are the file stems of `data.wbi_img.img_url` and `sub_url`.
pub fn to_wbi_keys(value: &Value) -> Result<(String, String)> {
    let img_url: String = get_val!(value, "data", "wbi_img", "img_url")?;
    let sub_url: String = get_val!(value, "data", "wbi_img", "sub_url")?;
    Ok((url_stem(&img_url)?, url_stem(&sub_url)?))
}

fn url_stem(url: &str) -> Result<String> {
    let file = url.rsplit('/').next().unwrap_or(url);
    let stem = file.split('.').next().unwrap_or(file);
    if stem.is_empty() {
        return Err(anyhow!("empty wbi key in {:?}", url));
    }
    Ok(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_candidate_never_empty() {
        assert!(StreamCandidate::new(None, Vec::new()).is_none());
        assert!(StreamCandidate::new(Some(String::new()), vec![String::new()]).is_none());

        let c = StreamCandidate::new(
            Some("https://a/1".to_string()),
            vec!["https://b/1".to_string(), "https://a/1".to_string()],
        )
        .unwrap();
        assert_eq!(c.primary(), "https://a/1");
        assert_eq!(c.backups(), &["https://b/1".to_string()]);
        assert_eq!(c.urls().len(), 2);
    }

    #[test]
    fn test_backup_promoted_when_primary_missing() {
        let c = StreamCandidate::new(None, vec!["https://b/1".to_string()]).unwrap();
        assert_eq!(c.primary(), "https://b/1");
        assert!(c.backups().is_empty());
    }

    #[test]
    fn test_to_video_metadata() {
        let value = json!({
            "code": 0,
            "data": {
                "bvid": "BV1xx411c7mD",
                "title": "Live &amp; Loud",
                "pic": "//i0.hdslb.com/bfs/archive/x.jpg",
                "cid": 1002,
                "pages": [
                    {"cid": 1001, "page": 1, "part": "Intro", "duration": 61},
                    {"cid": 1002, "page": 2, "part": "Main", "duration": 245}
                ]
            }
        });

        let meta = to_video_metadata(&value).unwrap().unwrap();
        assert_eq!(meta.video_id, "BV1xx411c7mD");
        assert_eq!(meta.title, "Live & Loud");
        assert_eq!(meta.cover_url, "https://i0.hdslb.com/bfs/archive/x.jpg");
        assert_eq!(meta.default_part_id, 1002);
        assert_eq!(meta.parts.len(), 2);
        assert_eq!(meta.parts[1].label, "Main");
        assert_eq!(meta.parts[1].duration, 245);
    }

    #[test]
    fn test_to_video_metadata_empty_payload() {
        assert!(to_video_metadata(&json!({"code": 0, "data": null})).unwrap().is_none());
        assert!(to_video_metadata(&json!({"code": 0})).unwrap().is_none());
        assert!(
            to_video_metadata(&json!({"code": 0, "data": {"bvid": "BV1", "pages": []}}))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_to_search_result() {
        let value = json!({
            "code": 0,
            "data": {
                "page": 2,
                "pagesize": 20,
                "numResults": 1000,
                "result": [{
                    "type": "video",
                    "bvid": "BV1Ab411c7mD",
                    "aid": 170001,
                    "title": "<em class=\"keyword\">Lofi</em> mix",
                    "author": "someone",
                    "pic": "//i1.hdslb.com/cover.jpg",
                    "duration": "1:02:03",
                    "play": 4242
                }]
            }
        });

        let result = to_search_result(&value, 2).unwrap();
        assert_eq!(result.total, 1000);
        assert_eq!(result.page, 2);
        assert_eq!(result.page_size, 20);
        let item = &result.items[0];
        assert_eq!(item.title, "Lofi mix");
        assert_eq!(item.cover_url, "https://i1.hdslb.com/cover.jpg");
        assert_eq!(item.duration, 3723);
        assert_eq!(item.play_count, 4242);
    }

    #[test]
    fn test_to_search_result_no_matches() {
        let value = json!({"code": 0, "data": {"page": 1, "pagesize": 20, "numResults": 0}});
        let result = to_search_result(&value, 1).unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_stream_candidate_prefers_highest_bandwidth() {
        let value = json!({
            "code": 0,
            "data": {
                "dash": {
                    "audio": [
                        {"id": 30216, "bandwidth": 67000, "baseUrl": "https://low", "backupUrl": []},
                        {"id": 30280, "bandwidth": 319000, "baseUrl": "https://high",
                         "backupUrl": ["https://high-b1", "https://high-b2"]}
                    ],
                    "flac": null
                }
            }
        });

        let c = to_stream_candidate(&value).unwrap();
        assert_eq!(c.primary(), "https://high");
        assert_eq!(c.backups(), &["https://high-b1".to_string(), "https://high-b2".to_string()]);
    }

    #[test]
    fn test_stream_candidate_prefers_flac() {
        let value = json!({
            "data": {
                "dash": {
                    "audio": [{"bandwidth": 319000, "base_url": "https://high"}],
                    "flac": {"audio": {"base_url": "https://flac", "backup_url": null}}
                }
            }
        });
        assert_eq!(to_stream_candidate(&value).unwrap().primary(), "https://flac");
    }

    #[test]
    fn test_stream_candidate_falls_back_to_durl() {
        let value = json!({
            "data": {
                "durl": [{"url": "https://prog", "backup_url": ["https://prog-b"]}]
            }
        });
        let c = to_stream_candidate(&value).unwrap();
        assert_eq!(c.urls(), &["https://prog".to_string(), "https://prog-b".to_string()]);
    }

    #[test]
    fn test_stream_candidate_none_when_no_urls() {
        assert!(to_stream_candidate(&json!({"data": {"dash": {"audio": []}}})).is_none());
        assert!(to_stream_candidate(&json!({"data": null})).is_none());
    }

    #[test]
    fn test_to_wbi_keys() {
        let value = json!({
            "code": -101,
            "data": {
                "wbi_img": {
                    "img_url": "https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png",
                    "sub_url": "https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png"
                }
            }
        });
        let (img, sub) = to_wbi_keys(&value).unwrap();
        assert_eq!(img, "7cd084941338484aae1ad9425b84077c");
        assert_eq!(sub, "4932caff0ff746eab6f01bf08b70ac45");
    }
}
