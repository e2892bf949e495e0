#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Timeout, connection failure, 5xx or 429.
    Transient,
    /// Other 4xx, malformed URL, undecodable body.
    Permanent,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("fetch {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn transient(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: FetchErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: FetchErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn from_status(url: impl Into<String>, status: u16) -> Self {
        let message = format!("HTTP {status}");
        if status == 429 || (500..600).contains(&status) {
            Self::transient(url, message)
        } else {
            Self::permanent(url, message)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChapterError {
    #[error(transparent)]
    Retrieval(#[from] FetchError),

    #[error("no significant content found at {url}")]
    EmptyContent { url: String },
}

impl ChapterError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Retrieval(err) => err.is_transient(),
            Self::EmptyContent { .. } => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("no chapters to package")]
    NoChapters,

    #[error("manifest/spine mismatch: {manifest} manifest items, {spine} spine entries, {chapters} chapters")]
    Inconsistent {
        manifest: usize,
        spine: usize,
        chapters: usize,
    },

    #[error("write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("write archive: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("aborted on first failure: {source}")]
    Aborted {
        #[source]
        source: ChapterError,
    },

    #[error("cancelled after {completed} of {total} chapters")]
    Cancelled { completed: usize, total: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_splits_transient_and_permanent() {
        assert!(FetchError::from_status("u", 503).is_transient());
        assert!(FetchError::from_status("u", 429).is_transient());
        assert!(!FetchError::from_status("u", 404).is_transient());
        assert!(!FetchError::from_status("u", 403).is_transient());
    }

    #[test]
    fn empty_content_is_never_transient() {
        let err = ChapterError::EmptyContent {
            url: "https://example.com/c/1".to_owned(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("https://example.com/c/1"));
    }
}
