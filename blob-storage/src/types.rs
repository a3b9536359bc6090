use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content type recorded when the uploader did not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Path prefix under which blobs are served; catalog media URLs point here.
pub const FILES_ROUTE_PREFIX: &str = "/files/";

/// Store-issued identifier of a blob. Rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobId(Uuid);

impl BlobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Public URL the blob is served from.
    pub fn url(&self) -> String {
        format!("{}{}", FILES_ROUTE_PREFIX, self)
    }

    /// Extracts the blob id from a media URL of the form `/files/<id>`,
    /// optionally under `/api` and optionally carrying a query string.
    /// Returns `None` for URLs that do not belong to this store.
    pub fn from_media_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let path = path.strip_prefix("/api").unwrap_or(path);
        let id = path.strip_prefix(FILES_ROUTE_PREFIX)?;
        id.trim_end_matches('/').parse().ok()
    }
}

impl Display for BlobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for BlobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl TryFrom<String> for BlobId {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlobId> for String {
    fn from(id: BlobId) -> Self {
        id.to_string()
    }
}

/// Coarse classification used to pick a player. Derived once at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Only the declared content type is consulted, never the bytes.
    pub fn from_content_type(content_type: &str) -> Self {
        let is_audio = content_type
            .get(..6)
            .map(|prefix| prefix.eq_ignore_ascii_case("audio/"))
            .unwrap_or(false);
        if is_audio {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// Committed description of a blob. Written once, after every chunk is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    pub blob_id: BlobId,
    pub length: u64,
    pub content_type: String,
    pub original_name: String,
    pub stored_filename: String,
    pub media_kind: MediaKind,
    /// Hex SHA-256 of the full content.
    pub sha256: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl BlobMetadata {
    /// Number of chunks the blob occupies for the given chunk size.
    pub fn chunk_count(&self, chunk_size: usize) -> u64 {
        self.length.div_ceil(chunk_size as u64)
    }
}
