//! WBI request signing
//!
//! Search and play-address endpoints reject unsigned queries. The signature
//! is an md5 over the sorted, encoded query with a mixin key appended.

const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25,
    54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

/// Characters the server drops from values before verifying
const FILTERED_CHARS: &[char] = &['!', '\'', '(', ')', '*'];

/// Derive the 32-char mixin key from the nav image keys
pub fn mixin_key(img_key: &str, sub_key: &str) -> String {
    let raw: Vec<u8> = format!("{}{}", img_key, sub_key).into_bytes();
    MIXIN_KEY_ENC_TAB
        .iter()
        .filter_map(|&i| raw.get(i).map(|&b| b as char))
        .take(32)
        .collect()
}

/// Sign `params` in place, appending `wts` and `w_rid`
///
/// Params end up sorted by key with filtered values, which is also the
/// order they must be sent in.
pub fn sign(params: &mut Vec<(String, String)>, mixin_key: &str, wts: i64) {
    params.retain(|(k, _)| k != "wts" && k != "w_rid");
    params.push(("wts".to_string(), wts.to_string()));
    for (_, v) in params.iter_mut() {
        v.retain(|c| !FILTERED_CHARS.contains(&c));
    }
    params.sort_by(|a, b| a.0.cmp(&b.0));

    let query = encode_query(params);
    let w_rid = format!("{:x}", md5::compute(format!("{}{}", query, mixin_key)));
    params.push(("w_rid".to_string(), w_rid));
}

/// `k=v&k=v` with RFC 3986 percent-encoding (spaces as `%20`)
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMG_KEY: &str = "7cd084941338484aae1ad9425b84077c";
    const SUB_KEY: &str = "4932caff0ff746eab6f01bf08b70ac45";

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mixin_key() {
        assert_eq!(mixin_key(IMG_KEY, SUB_KEY), "ea1db124af3c7062474693fa704f4ff8");
    }

    #[test]
    fn test_sign_known_vector() {
        let mut p = params(&[("foo", "114"), ("bar", "514"), ("zab", "1919810")]);
        sign(&mut p, &mixin_key(IMG_KEY, SUB_KEY), 1702204169);

        assert_eq!(
            encode_query(&p),
            "bar=514&foo=114&wts=1702204169&zab=1919810&w_rid=8f6f2b5b3d485fe1886cec6a0be8c5d4"
        );
    }

    #[test]
    fn test_sign_filters_and_encodes() {
        let mut p = params(&[("keyword", "rock (live)!"), ("page", "1")]);
        sign(&mut p, "k", 1);
        assert_eq!(p[0], ("keyword".to_string(), "rock live".to_string()));
        assert!(encode_query(&p).starts_with("keyword=rock%20live&page=1&wts=1&w_rid="));
    }

    #[test]
    fn test_resign_replaces_previous_signature() {
        let mut p = params(&[("a", "1")]);
        sign(&mut p, "k", 1);
        sign(&mut p, "k", 2);
        assert_eq!(p.iter().filter(|(k, _)| k == "w_rid").count(), 1);
        assert_eq!(p.iter().filter(|(k, _)| k == "wts").count(), 1);
    }
}
