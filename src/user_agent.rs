//! User-Agent selection
//!
//! The upstream API and the external downloader both receive a desktop
//! Chrome User-Agent. When rotation is enabled the patch digit varies per
//! request, matching what the web client population looks like.

use rand::Rng;

const UA_PREFIX: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.";
const UA_SUFFIX: &str = " Safari/537.36";

/// Produces the User-Agent string for each request or downloader call.
#[derive(Debug, Clone, Copy)]
pub struct UserAgentPolicy {
    rotate: bool,
}

impl UserAgentPolicy {
    /// A policy that rotates the patch digit when `rotate` is true and
    /// returns a fixed string otherwise.
    pub fn new(rotate: bool) -> Self {
        Self { rotate }
    }

    /// The next User-Agent to send.
    pub fn next(&self) -> String {
        let patch = if self.rotate {
            rand::thread_rng().gen_range(0..=999)
        } else {
            0
        };
        format!("{UA_PREFIX}{patch}{UA_SUFFIX}")
    }
}
