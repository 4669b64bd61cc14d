//! Wire types for the navigation and space listing endpoints
//!
//! Request parameters are typed structs with a closed field set rather than
//! free-form maps; responses mirror the upstream JSON envelope with a
//! `code`/`message` pair wrapping the payload.

use crate::VideoRecord;
use serde::Deserialize;

/// Path of the navigation endpoint that publishes the WBI key fragments.
pub const NAV_PATH: &str = "/x/web-interface/nav";

/// Path of the paginated space listing endpoint.
pub const ARC_SEARCH_PATH: &str = "/x/space/wbi/arc/search";

/// Query parameters for one listing page request.
///
/// The field set is closed: everything the endpoint recognizes is declared
/// here, and the fixed protocol values (`order`, `platform`,
/// `web_location`) are not configurable.
#[derive(Debug, Clone)]
pub struct ArcSearchParams {
    /// Uploader space id
    pub mid: String,
    /// Page size (`ps`)
    pub page_size: u32,
    /// 1-indexed page number (`pn`)
    pub page_number: u32,
}

impl ArcSearchParams {
    /// Build parameters for page `page_number` of `mid`'s catalog.
    pub fn new(mid: impl Into<String>, page_size: u32, page_number: u32) -> Self {
        Self {
            mid: mid.into(),
            page_size,
            page_number,
        }
    }

    /// Expand into the key/value pairs handed to the signer.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("mid".to_string(), self.mid.clone()),
            ("ps".to_string(), self.page_size.to_string()),
            ("tid".to_string(), "0".to_string()),
            ("pn".to_string(), self.page_number.to_string()),
            ("order".to_string(), "pubdate".to_string()),
            ("platform".to_string(), "web".to_string()),
            ("web_location".to_string(), "1550101".to_string()),
            ("order_avoided".to_string(), "true".to_string()),
        ]
    }
}

/// Envelope of the navigation endpoint response.
#[derive(Debug, Deserialize)]
pub struct NavResponse {
    /// Application-level status code; 0 means success
    pub code: i64,
    /// Human-readable status message
    #[serde(default)]
    pub message: String,
    /// Payload, present on success
    pub data: Option<NavData>,
}

/// Navigation payload carrying the WBI image URLs.
#[derive(Debug, Deserialize)]
pub struct NavData {
    /// The two key-bearing URLs
    pub wbi_img: WbiImg,
}

/// The two URLs whose filename stems are the WBI key fragments.
#[derive(Debug, Deserialize)]
pub struct WbiImg {
    /// URL carrying the `img_key` fragment
    pub img_url: String,
    /// URL carrying the `sub_key` fragment
    pub sub_url: String,
}

/// Envelope of the space listing endpoint response.
#[derive(Debug, Deserialize)]
pub struct ArcSearchResponse {
    /// Application-level status code; 0 means success
    pub code: i64,
    /// Human-readable status message
    #[serde(default)]
    pub message: String,
    /// Payload, present on success
    pub data: Option<ArcSearchData>,
}

/// Listing payload.
#[derive(Debug, Deserialize)]
pub struct ArcSearchData {
    /// Video list container
    #[serde(default)]
    pub list: VideoList,
}

/// Video list container.
#[derive(Debug, Default, Deserialize)]
pub struct VideoList {
    /// Entries of this page, reverse-chronological by convention
    #[serde(default)]
    pub vlist: Vec<VideoEntry>,
}

/// One listing-page entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoEntry {
    /// Short id
    pub bvid: String,
    /// Internal numeric id
    #[serde(default)]
    pub aid: i64,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Uploader display name
    #[serde(default)]
    pub author: String,
    /// Uploader numeric id
    #[serde(default)]
    pub mid: i64,
    /// Creation time (Unix timestamp, seconds)
    pub created: i64,
    /// Duration string
    #[serde(default)]
    pub length: String,
    /// Cover picture URL
    #[serde(default)]
    pub pic: String,
    /// Play count
    #[serde(default)]
    pub play: i64,
    /// Comment count
    #[serde(default)]
    pub comment: i64,
    /// Danmaku count
    #[serde(default)]
    pub video_review: i64,
}

impl From<VideoEntry> for VideoRecord {
    fn from(entry: VideoEntry) -> Self {
        VideoRecord {
            bvid: entry.bvid,
            aid: entry.aid,
            title: entry.title,
            description: entry.description,
            author: entry.author,
            mid: entry.mid,
            created: entry.created,
            length: entry.length,
            pic: entry.pic,
            play: entry.play,
            comment: entry.comment,
            video_review: entry.video_review,
        }
    }
}
