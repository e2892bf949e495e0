use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Untitled Story";
pub const DEFAULT_AUTHOR: &str = "Unknown Author";
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMetadata {
    pub source_url: String,
    pub title: String,
    pub author: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_index: Option<String>,
}

impl StoryMetadata {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            title: DEFAULT_TITLE.to_owned(),
            author: DEFAULT_AUTHOR.to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
            identifier: None,
            cover_url: None,
            subject: None,
            description: None,
            series_name: None,
            series_index: None,
        }
    }

    pub fn unique_identifier(&self) -> &str {
        match self.identifier.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => &self.source_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Error,
}

impl ChapterStatus {
    pub fn can_transition_to(self, next: ChapterStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Complete)
                | (Self::InProgress, Self::Error)
        )
    }
}

/// One line of `chapters.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDescriptor {
    pub source_url: String,
    pub title: String,
    #[serde(default)]
    pub ordinal: usize,
    #[serde(default = "default_included")]
    pub included: bool,
    #[serde(default)]
    pub status: ChapterStatus,
}

fn default_included() -> bool {
    true
}

impl ChapterDescriptor {
    pub fn new(source_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            title: title.into(),
            ordinal: 0,
            included: true,
            status: ChapterStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFragment {
    pub html: String,
}

impl ContentFragment {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

#[derive(Debug, Clone)]
pub struct PackagedChapter {
    pub title: String,
    pub source_url: String,
    pub fragment: ContentFragment,
    pub failed: bool,
}
