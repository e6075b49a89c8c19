//! Maps X API v2 JSON payloads into domain `Post`s.

use crate::domain::{MediaKind, MediaRef, Post};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// `GET /2/users/by/username/{handle}`
#[derive(Debug, Deserialize)]
pub struct UserLookup {
    pub data: Option<UserData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
}

/// `GET /2/users/{id}/tweets` and `GET /2/tweets/search/recent`
#[derive(Debug, Default, Deserialize)]
pub struct TweetsPage {
    #[serde(default)]
    pub data: Vec<TweetData>,
    #[serde(default)]
    pub includes: Includes,
}

#[derive(Debug, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<UserData>,
    #[serde(default)]
    pub media: Vec<MediaData>,
}

#[derive(Debug, Deserialize)]
pub struct MediaData {
    pub media_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
pub struct Variant {
    pub content_type: String,
    pub url: String,
    pub bit_rate: Option<u64>,
}

/// `POST /2/tweets` and `POST /2/media/upload` both answer `{"data": {"id": ...}}`.
#[derive(Debug, Deserialize)]
pub struct CreatedResponse {
    pub data: Option<CreatedData>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedData {
    pub id: String,
}

/// Convert a page of tweets to posts. `fallback_author` is used when the
/// author is not expanded (user timelines).
pub fn to_posts(page: TweetsPage, fallback_author: Option<&str>) -> Vec<Post> {
    let users: HashMap<&str, &str> = page
        .includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u.username.as_str()))
        .collect();
    let media: HashMap<&str, &MediaData> = page
        .includes
        .media
        .iter()
        .map(|m| (m.media_key.as_str(), m))
        .collect();

    page.data
        .iter()
        .map(|t| {
            let author = t
                .author_id
                .as_deref()
                .and_then(|id| users.get(id).copied())
                .or(fallback_author)
                .or(t.author_id.as_deref())
                .unwrap_or("unknown")
                .to_string();
            let media_refs = t
                .attachments
                .as_ref()
                .map(|a| {
                    a.media_keys
                        .iter()
                        .filter_map(|k| media.get(k.as_str()).and_then(|m| to_media_ref(m)))
                        .collect()
                })
                .unwrap_or_default();
            Post {
                id: t.id.clone(),
                author,
                text: t.text.clone(),
                media_refs,
                timestamp: t.created_at.unwrap_or_else(Utc::now),
            }
        })
        .collect()
}

/// Photos use `url`; videos and GIFs use the highest bit-rate MP4 variant.
fn to_media_ref(m: &MediaData) -> Option<MediaRef> {
    match m.kind.as_str() {
        "photo" => m.url.clone().map(|url| MediaRef {
            url,
            kind: MediaKind::Photo,
        }),
        "video" | "animated_gif" => {
            let kind = if m.kind == "video" {
                MediaKind::Video
            } else {
                MediaKind::Gif
            };
            m.variants
                .iter()
                .filter(|v| v.content_type == "video/mp4")
                .max_by_key(|v| v.bit_rate.unwrap_or(0))
                .map(|v| MediaRef {
                    url: v.url.clone(),
                    kind,
                })
        }
        _ => None,
    }
}
