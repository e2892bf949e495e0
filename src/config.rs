use std::time::Duration;

use crate::error::JobError;

pub const DEFAULT_DELAY_MS: u64 = 2000;
pub const DEFAULT_MAX_CHAPTERS: usize = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("webtoepub/", env!("CARGO_PKG_VERSION"));
pub const USER_AGENT_ENV: &str = "WEBTOEPUB_USER_AGENT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_redirects: 10,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(agent) = std::env::var(USER_AGENT_ENV)
            && !agent.trim().is_empty()
        {
            config.user_agent = agent.trim().to_owned();
        }
        config
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub min_interval: Duration,
    pub max_chapters: usize,
    pub abort_on_first_failure: bool,
    pub keep_partial: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(DEFAULT_DELAY_MS),
            max_chapters: DEFAULT_MAX_CHAPTERS,
            abort_on_first_failure: false,
            keep_partial: false,
        }
    }
}

impl JobConfig {
    /// Rejects a selection before any chapter is fetched.
    pub fn validate(&self, selected: usize) -> Result<(), JobError> {
        if selected == 0 {
            return Err(JobError::Configuration(
                "no chapters selected".to_owned(),
            ));
        }
        if selected > self.max_chapters {
            return Err(JobError::Configuration(format!(
                "{selected} chapters selected, maximum is {}",
                self.max_chapters
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_and_oversized_selections() {
        let config = JobConfig {
            max_chapters: 3,
            ..JobConfig::default()
        };
        assert!(config.validate(1).is_ok());
        assert!(config.validate(3).is_ok());

        let err = config.validate(0).expect_err("empty selection");
        assert!(matches!(err, JobError::Configuration(_)));

        let err = config.validate(4).expect_err("too many chapters");
        assert!(err.to_string().contains("maximum is 3"));
    }

    #[test]
    fn defaults() {
        let job = JobConfig::default();
        assert_eq!(job.min_interval, Duration::from_secs(2));
        assert_eq!(job.max_chapters, 1000);
        assert!(!job.abort_on_first_failure);

        let fetch = FetchConfig::default().with_timeout_secs(5);
        assert_eq!(fetch.timeout, Duration::from_secs(5));
        assert!(fetch.user_agent.starts_with("webtoepub/"));
    }
}
