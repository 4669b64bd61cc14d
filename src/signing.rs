//! WBI request signing
//!
//! The space listing API authenticates requests with a `w_rid` signature
//! derived from two rotating key fragments published by the navigation
//! endpoint. The derivation must be bit-exact: the two fragments are
//! concatenated, permuted through a fixed 64-entry table and truncated to a
//! 32-character mixin key; the request parameters are timestamped, sorted,
//! sanitized and form-urlencoded; the signature is the MD5 hex digest of
//! the encoded query with the mixin key appended.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved parameter key for the request timestamp.
pub const TIMESTAMP_KEY: &str = "wts";

/// Reserved parameter key for the derived signature.
pub const SIGNATURE_KEY: &str = "w_rid";

/// Characters stripped from every parameter value before encoding.
const STRIPPED_CHARS: [char; 5] = ['!', '\'', '(', ')', '*'];

/// Fixed permutation applied to the concatenated key fragments.
///
/// This table is a protocol constant; changing any entry breaks
/// server-side signature verification.
const MIXIN_KEY_TABLE: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22,
    25, 54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

/// Signing errors
#[derive(Debug, Error)]
pub enum SigningError {
    /// One of the key fragments was empty
    #[error("key fragment '{0}' is empty")]
    EmptyKeyFragment(&'static str),

    /// A key URL did not contain an extractable filename stem
    #[error("cannot extract key fragment from URL: {0}")]
    MalformedKeyUrl(String),
}

/// The two rotating key fragments published by the navigation endpoint.
///
/// Both fragments must be non-empty; the client refetches them once per
/// crawl run and never signs with stale or absent keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    /// Fragment extracted from the `img_url` field
    pub img_key: String,
    /// Fragment extracted from the `sub_url` field
    pub sub_key: String,
}

impl KeyMaterial {
    /// Create key material, rejecting empty fragments.
    pub fn new(img_key: impl Into<String>, sub_key: impl Into<String>) -> Result<Self, SigningError> {
        let img_key = img_key.into();
        let sub_key = sub_key.into();
        if img_key.is_empty() {
            return Err(SigningError::EmptyKeyFragment("img_key"));
        }
        if sub_key.is_empty() {
            return Err(SigningError::EmptyKeyFragment("sub_key"));
        }
        Ok(Self { img_key, sub_key })
    }

    /// Derive the 32-character mixin key from both fragments.
    pub fn mixin_key(&self) -> String {
        mixin_key(&format!("{}{}", self.img_key, self.sub_key))
    }
}

/// Extract a key fragment from a key URL: the filename stem preceding the
/// extension, e.g. `https://host/path/7cd084941338484aae1ad9425b84077c.png`
/// yields `7cd084941338484aae1ad9425b84077c`.
pub fn key_from_url(url: &str) -> Result<String, SigningError> {
    let stem = url
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| SigningError::MalformedKeyUrl(url.to_string()))?;
    Ok(stem.to_string())
}

/// Apply the fixed permutation to the concatenated fragments and truncate
/// to 32 characters.
pub fn mixin_key(concatenated: &str) -> String {
    let chars: Vec<char> = concatenated.chars().collect();
    MIXIN_KEY_TABLE
        .iter()
        .filter_map(|&i| chars.get(i))
        .take(32)
        .collect()
}

/// Sign a parameter list.
///
/// Inserts the timestamp under [`TIMESTAMP_KEY`], sorts all parameters
/// lexicographically by key, strips `!'()*` from every value, encodes the
/// sorted map as a form-urlencoded query, and appends the MD5 hex digest of
/// `query + mixin_key` under [`SIGNATURE_KEY`].
///
/// The result is a pure function of `(params, keys, now)`: identical inputs
/// always produce an identical signed parameter list.
pub fn sign_params(
    params: &[(String, String)],
    keys: &KeyMaterial,
    now: i64,
) -> Vec<(String, String)> {
    let mixin = keys.mixin_key();

    let mut sorted: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.clone(), sanitize(v)))
        .chain(std::iter::once((
            TIMESTAMP_KEY.to_string(),
            now.to_string(),
        )))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let query = encode_query(&sorted);
    let signature = format!("{:x}", md5::compute(format!("{query}{mixin}")));

    sorted.push((SIGNATURE_KEY.to_string(), signature));
    sorted
}

/// Encode sorted parameters as an `application/x-www-form-urlencoded`
/// query string (space as `+`).
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn sanitize(value: &str) -> String {
    value.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect()
}

fn encode_component(value: &str) -> String {
    // Percent-encoding with the form-urlencoded space convention.
    urlencoding::encode(value).replace("%20", "+")
}
