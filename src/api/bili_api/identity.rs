//! Synthetic client identity for Bilibili requests
//!
//! The API rejects far fewer requests that carry a browser-like tracking
//! cookie pair. `buvid3` stays fixed for the life of the process, `_uuid`
//! is fresh on every request.

use reqwest::header::{self, HeaderMap, HeaderValue};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REFERER: &str = "https://www.bilibili.com/";
const ORIGIN: &str = "https://www.bilibili.com";

/// Literal marker closing every `buvid3` value
const SESSION_MARKER: &str = "infoc";

/// Process-wide identity, constructed once at startup and shared by reference
#[derive(Debug, Clone)]
pub struct Identity {
    session_token: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

impl Identity {
    pub fn new() -> Self {
        Self {
            session_token: Self::generate_session_token(),
        }
    }

    /// The `buvid3` value used for every request from this instance
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` + 5 timestamp digits + `infoc`
    pub fn generate_session_token() -> String {
        let millis = chrono::Utc::now().timestamp_millis().rem_euclid(100_000);
        format!(
            "{}{:05}{}",
            hex_groups(&random_bytes(), true),
            millis,
            SESSION_MARKER
        )
    }

    /// A fresh UUID-shaped identifier (version 4 layout)
    pub fn generate_request_id() -> String {
        let mut bytes = random_bytes();
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        hex_groups(&bytes, false)
    }

    /// Browser-like header set plus the tracking cookie pair
    pub fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::REFERER, HeaderValue::from_static(REFERER));
        headers.insert(header::ORIGIN, HeaderValue::from_static(ORIGIN));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );

        let cookie = format!(
            "buvid3={}; _uuid={}",
            self.session_token,
            Self::generate_request_id()
        );
        // Hex digits and ASCII punctuation only
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.insert(header::COOKIE, value);
        }
        headers
    }
}

fn random_bytes() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    rand::fill(&mut bytes[..]);
    bytes
}

fn hex_groups(bytes: &[u8; 16], upper: bool) -> String {
    let hex = if upper {
        hex::encode_upper(bytes)
    } else {
        hex::encode(bytes)
    };
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_session_token_shape() {
        let re = Regex::new(
            r"^[0-9A-F]{8}-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{12}[0-9]{5}infoc$",
        )
        .unwrap();
        let token = Identity::generate_session_token();
        assert!(re.is_match(&token), "bad token {}", token);
    }

    #[test]
    fn test_session_token_stable_per_identity() {
        let identity = Identity::new();
        let first = identity.build_headers();
        let second = identity.build_headers();

        let cookie = |h: &HeaderMap| h.get(header::COOKIE).unwrap().to_str().unwrap().to_string();
        let buvid = |c: &str| c.split("; ").next().unwrap().to_string();

        assert_eq!(buvid(&cookie(&first)), buvid(&cookie(&second)));
        assert_eq!(
            buvid(&cookie(&first)),
            format!("buvid3={}", identity.session_token())
        );
        // `_uuid` differs per request
        assert_ne!(cookie(&first), cookie(&second));
    }

    #[test]
    fn test_request_id_is_uuid_shaped() {
        let re = Regex::new(
            r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        )
        .unwrap();
        let a = Identity::generate_request_id();
        let b = Identity::generate_request_id();
        assert!(re.is_match(&a), "bad id {}", a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_build_headers_mimics_browser() {
        let headers = Identity::new().build_headers();
        assert_eq!(headers.get(header::REFERER).unwrap(), REFERER);
        assert_eq!(headers.get(header::ORIGIN).unwrap(), ORIGIN);
        assert!(
            headers
                .get(header::USER_AGENT)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("Mozilla/5.0")
        );
        assert!(headers.contains_key(header::ACCEPT));
    }
}
