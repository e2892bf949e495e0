use std::fs::OpenOptions;
use std::io::{BufRead as _, BufReader, Write as _};
use std::path::Path;

use anyhow::Context as _;

use crate::formats::{ChapterDescriptor, ChapterStatus};
use crate::urls::normalize_for_compare;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterList {
    chapters: Vec<ChapterDescriptor>,
}

impl ChapterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ChapterDescriptor>) -> Self {
        let mut list = Self::new();
        for descriptor in descriptors {
            list.push(descriptor);
        }
        list
    }

    pub fn push(&mut self, mut descriptor: ChapterDescriptor) -> bool {
        let key = normalize_for_compare(&descriptor.source_url);
        if self
            .chapters
            .iter()
            .any(|c| normalize_for_compare(&c.source_url) == key)
        {
            return false;
        }
        descriptor.ordinal = self.chapters.len();
        self.chapters.push(descriptor);
        true
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChapterDescriptor> {
        self.chapters.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ChapterDescriptor> {
        self.chapters.get(index)
    }

    pub fn as_slice(&self) -> &[ChapterDescriptor] {
        &self.chapters
    }

    pub fn into_descriptors(self) -> Vec<ChapterDescriptor> {
        self.chapters
    }

    pub fn included_count(&self) -> usize {
        self.chapters.iter().filter(|c| c.included).count()
    }

    pub fn included_indices(&self) -> Vec<usize> {
        self.chapters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.included)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn select_all(&mut self) {
        self.set_all_included(true);
    }

    pub fn select_none(&mut self) {
        self.set_all_included(false);
    }

    fn set_all_included(&mut self, included: bool) {
        for chapter in &mut self.chapters {
            chapter.included = included;
        }
    }

    pub fn set_included(&mut self, index: usize, included: bool) -> bool {
        match self.chapters.get_mut(index) {
            Some(chapter) => {
                chapter.included = included;
                true
            }
            None => false,
        }
    }

    pub fn include_range(&mut self, first: usize, last: usize) {
        for (idx, chapter) in self.chapters.iter_mut().enumerate() {
            let position = idx + 1;
            chapter.included = position >= first && position <= last;
        }
    }

    pub fn retitle(&mut self, index: usize, title: impl Into<String>) -> bool {
        match self.chapters.get_mut(index) {
            Some(chapter) => {
                chapter.title = title.into();
                true
            }
            None => false,
        }
    }

    pub fn reverse(&mut self) {
        self.chapters.reverse();
        self.renumber();
    }

    pub fn move_chapter(&mut self, from: usize, to: usize) -> bool {
        if from >= self.chapters.len() || to >= self.chapters.len() {
            return false;
        }
        let chapter = self.chapters.remove(from);
        self.chapters.insert(to, chapter);
        self.renumber();
        true
    }

    pub fn retain(&mut self, keep: impl FnMut(&ChapterDescriptor) -> bool) {
        self.chapters.retain(keep);
        self.renumber();
    }

    pub fn reset_statuses(&mut self) {
        for chapter in &mut self.chapters {
            chapter.status = ChapterStatus::Pending;
        }
    }

    /// Applies a status change; refuses moves that would re-enter a state.
    pub fn transition(&mut self, index: usize, next: ChapterStatus) -> bool {
        let Some(chapter) = self.chapters.get_mut(index) else {
            return false;
        };
        if !chapter.status.can_transition_to(next) {
            tracing::debug!(
                url = %chapter.source_url,
                from = ?chapter.status,
                to = ?next,
                "rejected chapter status transition"
            );
            return false;
        }
        chapter.status = next;
        true
    }

    pub(crate) fn force_status(&mut self, index: usize, status: ChapterStatus) {
        if let Some(chapter) = self.chapters.get_mut(index) {
            chapter.status = status;
        }
    }

    pub fn count_with_status(&self, status: ChapterStatus) -> usize {
        self.chapters.iter().filter(|c| c.status == status).count()
    }

    fn renumber(&mut self) {
        for (idx, chapter) in self.chapters.iter_mut().enumerate() {
            chapter.ordinal = idx;
        }
    }

    pub fn is_dense(&self) -> bool {
        self.chapters
            .iter()
            .enumerate()
            .all(|(idx, c)| c.ordinal == idx)
    }

    pub fn read_jsonl(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open chapter list: {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut descriptors = Vec::new();
        for line in reader.lines() {
            let line = line.context("read chapter list line")?;
            if line.trim().is_empty() {
                continue;
            }
            let descriptor: ChapterDescriptor =
                serde_json::from_str(&line).context("parse chapter descriptor")?;
            descriptors.push(descriptor);
        }

        let before = descriptors.len();
        let mut list = Self::from_descriptors(descriptors);
        if list.len() != before {
            tracing::info!(
                dropped = before - list.len(),
                "dropped duplicate chapters from list"
            );
        }
        list.reset_statuses();
        Ok(list)
    }

    pub fn write_jsonl(&self, path: &Path) -> anyhow::Result<()> {
        let mut out = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
            .with_context(|| format!("create chapter list: {}", path.display()))?;
        for chapter in &self.chapters {
            serde_json::to_writer(&mut out, chapter).context("serialize chapter descriptor")?;
            out.write_all(b"\n").context("write chapter list newline")?;
        }
        out.flush().context("flush chapter list")?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ChapterList {
    type Item = &'a ChapterDescriptor;
    type IntoIter = std::slice::Iter<'a, ChapterDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.chapters.iter()
    }
}
