use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocksdb::{ColumnFamily, IteratorMode, DB};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use blob_store::storage::column_family;
use blob_store::MediaReference;
use crate::errors::ServerErr;

/// Column family holding JSON-encoded lectures keyed by id.
pub const LECTURES_CF: &str = "lectures";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Youtube,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: String,
    pub title: String,
    pub speaker: String,
    pub masjid: String,
    pub date: Option<String>,
    pub media_type: MediaType,
    pub media_url: String,
    pub tags: Vec<String>,
    pub video_id: String,
    pub created_at: DateTime<Utc>,
}

impl MediaReference for Lecture {
    fn media_url(&self) -> Option<&str> {
        (!self.media_url.is_empty()).then_some(self.media_url.as_str())
    }
}

/// Tags arrive either as a list or as one comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    List(Vec<String>),
    Csv(String),
}

impl Tags {
    pub fn normalize(self) -> Vec<String> {
        let raw = match self {
            Tags::List(list) => list,
            Tags::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Body of a create or update. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LectureRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    pub speaker: Option<String>,
    pub masjid: Option<String>,
    pub date: Option<String>,
    pub media_type: Option<MediaType>,
    pub media_url: Option<String>,
    pub tags: Option<Tags>,
    pub video_id: Option<String>,
}

impl LectureRequest {
    pub fn into_lecture(self) -> Result<Lecture, ServerErr> {
        self.validate()?;
        let title = self
            .title
            .clone()
            .ok_or_else(|| ServerErr::BadRequest("title required".to_string()))?;
        let mut lecture = Lecture {
            id: Uuid::new_v4().simple().to_string(),
            title,
            speaker: String::new(),
            masjid: String::new(),
            date: None,
            media_type: MediaType::default(),
            media_url: String::new(),
            tags: Vec::new(),
            video_id: String::new(),
            created_at: Utc::now(),
        };
        self.apply_to(&mut lecture)?;
        Ok(lecture)
    }

    /// Overwrites the fields present in the request.
    pub fn apply_to(self, lecture: &mut Lecture) -> Result<(), ServerErr> {
        self.validate()?;
        if let Some(title) = self.title {
            lecture.title = title;
        }
        if let Some(speaker) = self.speaker {
            lecture.speaker = speaker;
        }
        if let Some(masjid) = self.masjid {
            lecture.masjid = masjid;
        }
        if let Some(date) = self.date {
            lecture.date = Some(date.trim().to_string()).filter(|date| !date.is_empty());
        }
        if let Some(media_type) = self.media_type {
            lecture.media_type = media_type;
        }
        if let Some(media_url) = self.media_url {
            lecture.media_url = media_url.trim().to_string();
        }
        if let Some(tags) = self.tags {
            lecture.tags = tags.normalize();
        }
        if let Some(video_id) = self.video_id {
            lecture.video_id = video_id;
        }
        Ok(())
    }
}

#[async_trait]
pub trait LectureCatalog: Send + Sync {
    /// All lectures, newest first.
    async fn list(&self) -> Result<Vec<Lecture>, ServerErr>;

    async fn get(&self, id: &str) -> Result<Option<Lecture>, ServerErr>;

    /// Inserts or replaces a lecture.
    async fn put(&self, lecture: &Lecture) -> Result<(), ServerErr>;

    /// Removes a lecture, returning it if it existed.
    async fn remove(&self, id: &str) -> Result<Option<Lecture>, ServerErr>;
}

pub type SharedCatalog = Arc<dyn LectureCatalog>;

fn newest_first(mut lectures: Vec<Lecture>) -> Vec<Lecture> {
    lectures.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    lectures
}

pub struct RocksLectureCatalog {
    db: Arc<DB>,
}

impl RocksLectureCatalog {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    /// Returns a handle to the "lectures" column family
    fn lectures(&self) -> Result<&ColumnFamily, ServerErr> {
        Ok(column_family(&self.db, LECTURES_CF)?)
    }

    fn decode(raw: &[u8]) -> Result<Lecture, ServerErr> {
        serde_json::from_slice(raw).map_err(ServerErr::catalog)
    }
}

#[async_trait]
impl LectureCatalog for RocksLectureCatalog {
    async fn list(&self) -> Result<Vec<Lecture>, ServerErr> {
        let mut lectures = Vec::new();
        for item in self.db.iterator_cf(self.lectures()?, IteratorMode::Start) {
            let (_, value) = item?;
            lectures.push(Self::decode(&value)?);
        }
        Ok(newest_first(lectures))
    }

    async fn get(&self, id: &str) -> Result<Option<Lecture>, ServerErr> {
        match self.db.get_pinned_cf(self.lectures()?, id.as_bytes())? {
            Some(raw) => Ok(Some(Self::decode(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, lecture: &Lecture) -> Result<(), ServerErr> {
        let value = serde_json::to_vec(lecture).map_err(ServerErr::catalog)?;
        self.db.put_cf(self.lectures()?, lecture.id.as_bytes(), value)?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<Option<Lecture>, ServerErr> {
        let existing = self.get(id).await?;
        if existing.is_some() {
            self.db.delete_cf(self.lectures()?, id.as_bytes())?;
        }
        Ok(existing)
    }
}

#[derive(Default, Clone)]
pub struct MemoryLectureCatalog {
    lectures: Arc<DashMap<String, Lecture>>,
}

impl MemoryLectureCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LectureCatalog for MemoryLectureCatalog {
    async fn list(&self) -> Result<Vec<Lecture>, ServerErr> {
        Ok(newest_first(self.lectures.iter().map(|entry| entry.value().clone()).collect()))
    }

    async fn get(&self, id: &str) -> Result<Option<Lecture>, ServerErr> {
        Ok(self.lectures.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, lecture: &Lecture) -> Result<(), ServerErr> {
        self.lectures.insert(lecture.id.clone(), lecture.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<Option<Lecture>, ServerErr> {
        Ok(self.lectures.remove(id).map(|(_, lecture)| lecture))
    }
}
