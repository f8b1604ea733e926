//! YouTube URL helpers

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Default host serving video thumbnails
pub const DEFAULT_THUMBNAIL_BASE_URL: &str = "https://img.youtube.com/vi";

static VIDEO_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

fn is_video_id(candidate: &str) -> bool {
    VIDEO_ID.is_match(candidate)
}

/// Extract the 11-character video id from a YouTube URL or a bare id.
pub fn extract_video_id(source: &str) -> Option<String> {
    let source = source.trim();
    if is_video_id(source) {
        return Some(source.to_string());
    }

    let url = Url::parse(source).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed" | "shorts" | "v" | "live") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

/// URL of the high quality thumbnail for a video id
pub fn thumbnail_url(base_url: &str, video_id: &str) -> String {
    format!("{}/{}/hqdefault.jpg", base_url.trim_end_matches('/'), video_id)
}
