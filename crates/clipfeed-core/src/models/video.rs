use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Video metadata. `blob_url` points at private storage and is not playable;
/// use the media access resolver to obtain a signed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub blob_name: String,
    #[serde(default)]
    pub blob_url: String,
    pub user_id: String,
    #[serde(default)]
    pub created_at: String,
}

impl Video {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        super::parse_timestamp(&self.created_at)
    }
}

/// Response of the stream endpoint: a short-lived signed URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MediaStream {
    #[serde(default)]
    pub url: String,
}

/// Upload request assembled by the front end.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub file: PathBuf,
    pub recipe: Option<String>,
    pub visibility: Visibility,
}

impl NewVideo {
    pub fn new(title: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            file: file.into(),
            recipe: None,
            visibility: Visibility::Public,
        }
    }

    /// Trimmed title and recipe; an empty title is rejected, an empty recipe dropped.
    pub fn normalized(mut self) -> anyhow::Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            anyhow::bail!("Title is required");
        }
        self.recipe = self
            .recipe
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        Ok(self)
    }
}
