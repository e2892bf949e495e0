pub mod ao3;
pub mod default;
pub mod royalroad;

use dom_query::Document;

use crate::formats::{ChapterDescriptor, DEFAULT_AUTHOR, DEFAULT_TITLE, StoryMetadata};
use crate::page::Page;

#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub discover_chapters: fn(&Page) -> Vec<ChapterDescriptor>,
    /// Returns a detached document whose body holds the content region.
    pub locate_content_region: fn(&Page) -> Document,
    pub extract_title: fn(&Page) -> Option<String>,
    pub extract_author: fn(&Page) -> Option<String>,
    pub extract_language: fn(&Page) -> String,
    pub extract_cover_url: fn(&Page) -> Option<String>,
    pub extract_chapter_title: fn(&Page) -> Option<String>,
    pub extract_description: fn(&Page) -> Option<String>,
    pub extract_subject: fn(&Page) -> Option<String>,
}

impl Strategy {
    pub fn extract_metadata(&self, page: &Page) -> StoryMetadata {
        let mut metadata = StoryMetadata::new(page.url.as_str());
        metadata.title = (self.extract_title)(page).unwrap_or_else(|| DEFAULT_TITLE.to_owned());
        metadata.author = (self.extract_author)(page).unwrap_or_else(|| DEFAULT_AUTHOR.to_owned());
        metadata.language = (self.extract_language)(page);
        metadata.cover_url = (self.extract_cover_url)(page);
        metadata.description = (self.extract_description)(page);
        metadata.subject = (self.extract_subject)(page);
        metadata
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}
