use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::chapters::ChapterList;
use crate::config::JobConfig;
use crate::epub::xml_escape;
use crate::error::{ChapterError, FetchError, JobError};
use crate::fetch::{FetchResponse, Fetcher};
use crate::formats::{ChapterStatus, ContentFragment, PackagedChapter};
use crate::page::{Page, non_blank};
use crate::rate_limit::HostRateLimiter;
use crate::sanitize;
use crate::strategy::Strategy;
use crate::urls::normalized_host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    FirstFailure,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    ChapterStarted {
        index: usize,
        url: String,
    },
    ChapterCompleted {
        index: usize,
        url: String,
    },
    ChapterFailed {
        index: usize,
        url: String,
        message: String,
        transient: bool,
    },
    Finished {
        completed: usize,
        failed: usize,
    },
    Cancelled {
        completed: usize,
        total: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub chapters: Vec<PackagedChapter>,
    pub failed: usize,
    pub cancelled: bool,
}

pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    limiter: HostRateLimiter,
    config: JobConfig,
    state: JobState,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

struct RetrievedChapter {
    fragment: ContentFragment,
    extracted_title: Option<String>,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: JobConfig) -> Self {
        Self {
            fetcher,
            limiter: HostRateLimiter::new(config.min_interval),
            config,
            state: JobState::Idle,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn note_request(&mut self, url: &Url, at: Instant) {
        if let Some(host) = normalized_host(url) {
            self.limiter.record(&host, at);
        }
    }

    pub async fn run(
        &mut self,
        strategy: &Strategy,
        chapters: &mut ChapterList,
        cancel: &CancellationToken,
    ) -> Result<RetrievalOutcome, JobError> {
        let selected = chapters.included_indices();
        self.config.validate(selected.len())?;

        chapters.reset_statuses();
        self.state = JobState::Running;
        let total = selected.len();
        self.emit(ProgressEvent::Started { total });
        tracing::info!(strategy = strategy.name, chapters = total, "retrieval started");

        let mut outcome = RetrievalOutcome {
            chapters: Vec::with_capacity(total),
            failed: 0,
            cancelled: false,
        };

        for (position, index) in selected.into_iter().enumerate() {
            if cancel.is_cancelled() {
                let completed = outcome.chapters.len();
                self.state = JobState::Aborted(AbortReason::Cancelled);
                self.emit(ProgressEvent::Cancelled { completed, total });
                tracing::info!(completed, total, "retrieval cancelled");
                if !self.config.keep_partial {
                    return Err(JobError::Cancelled { completed, total });
                }
                outcome.cancelled = true;
                return Ok(outcome);
            }

            match self.retrieve_at(strategy, chapters, index, position).await {
                Ok(chapter) => outcome.chapters.push(chapter),
                Err((chapter, err)) => {
                    if self.config.abort_on_first_failure {
                        self.state = JobState::Aborted(AbortReason::FirstFailure);
                        return Err(JobError::Aborted { source: err });
                    }
                    outcome.failed += 1;
                    outcome.chapters.push(chapter);
                }
            }
        }

        self.state = JobState::Completed;
        let completed = outcome.chapters.len() - outcome.failed;
        self.emit(ProgressEvent::Finished {
            completed,
            failed: outcome.failed,
        });
        tracing::info!(completed, failed = outcome.failed, "retrieval finished");
        Ok(outcome)
    }

    /// Fetches one chapter again at the user's request, whatever its status.
    pub async fn retry_chapter(
        &mut self,
        strategy: &Strategy,
        chapters: &mut ChapterList,
        index: usize,
    ) -> Result<PackagedChapter, ChapterError> {
        let Some(descriptor) = chapters.get(index) else {
            return Err(ChapterError::Retrieval(FetchError::permanent(
                format!("#{index}"),
                "no such chapter",
            )));
        };
        tracing::info!(url = %descriptor.source_url, "retrying chapter");
        chapters.force_status(index, ChapterStatus::Pending);
        self.retrieve_at(strategy, chapters, index, index)
            .await
            .map_err(|(_, err)| err)
    }

    async fn retrieve_at(
        &mut self,
        strategy: &Strategy,
        chapters: &mut ChapterList,
        index: usize,
        position: usize,
    ) -> Result<PackagedChapter, (PackagedChapter, ChapterError)> {
        let Some(descriptor) = chapters.get(index).cloned() else {
            let err = ChapterError::Retrieval(FetchError::permanent(
                format!("#{index}"),
                "no such chapter",
            ));
            let chapter = failed_chapter(format!("Chapter {}", position + 1), "", &err);
            return Err((chapter, err));
        };
        let url = descriptor.source_url.clone();

        chapters.transition(index, ChapterStatus::InProgress);
        self.emit(ProgressEvent::ChapterStarted {
            index,
            url: url.clone(),
        });

        let fallback_title = |extracted: Option<String>| {
            non_blank(&descriptor.title)
                .or(extracted)
                .unwrap_or_else(|| format!("Chapter {}", position + 1))
        };

        match self.retrieve(strategy, &url).await {
            Ok(retrieved) => {
                chapters.transition(index, ChapterStatus::Complete);
                self.emit(ProgressEvent::ChapterCompleted {
                    index,
                    url: url.clone(),
                });
                tracing::debug!(%url, "chapter retrieved");
                Ok(PackagedChapter {
                    title: fallback_title(retrieved.extracted_title),
                    source_url: url,
                    fragment: retrieved.fragment,
                    failed: false,
                })
            }
            Err(err) => {
                chapters.transition(index, ChapterStatus::Error);
                self.emit(ProgressEvent::ChapterFailed {
                    index,
                    url: url.clone(),
                    message: err.to_string(),
                    transient: err.is_transient(),
                });
                tracing::warn!(%url, error = %err, "chapter failed");
                let chapter = failed_chapter(fallback_title(None), &url, &err);
                Err((chapter, err))
            }
        }
    }

    async fn retrieve(
        &mut self,
        strategy: &Strategy,
        url: &str,
    ) -> Result<RetrievedChapter, ChapterError> {
        let parsed =
            Url::parse(url).map_err(|err| FetchError::permanent(url, err.to_string()))?;
        let host = normalized_host(&parsed).unwrap_or_default();
        self.limiter.wait(&host).await;

        let response = self.fetcher.fetch(&parsed).await?;
        extract_chapter(strategy, &response)
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = progress.send(event);
        }
    }
}

fn extract_chapter(
    strategy: &Strategy,
    response: &FetchResponse,
) -> Result<RetrievedChapter, ChapterError> {
    let page = Page::parse(response.final_url.clone(), &response.content);
    let region = (strategy.locate_content_region)(&page);
    let fragment = sanitize::sanitize_document(&region);

    let body = region.select("body");
    let has_image = body
        .nodes()
        .iter()
        .any(|node| sanitize::contains_image(node));
    if body.text().trim().is_empty() && !has_image {
        return Err(ChapterError::EmptyContent {
            url: response.final_url.to_string(),
        });
    }

    Ok(RetrievedChapter {
        fragment,
        extracted_title: (strategy.extract_chapter_title)(&page),
    })
}

pub fn placeholder_fragment(url: &str, err: &ChapterError) -> ContentFragment {
    let url = xml_escape(url);
    ContentFragment::new(format!(
        r#"<div class="chapter-error"><p>This chapter could not be retrieved.</p><p>{}</p><p>Source: <a href="{url}">{url}</a></p></div>"#,
        xml_escape(&err.to_string()),
    ))
}

fn failed_chapter(title: String, url: &str, err: &ChapterError) -> PackagedChapter {
    PackagedChapter {
        title,
        source_url: url.to_owned(),
        fragment: placeholder_fragment(url, err),
        failed: true,
    }
}
