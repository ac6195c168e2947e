use serde::{Deserialize, Serialize};

/// Lifecycle status of a book. Ingestion never changes it; the dashboard
/// drives draft/publish/archive transitions.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    Draft,
    Published,
    Archived,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Draft => "DRAFT",
            BookStatus::Published => "PUBLISHED",
            BookStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(BookStatus::Draft),
            "PUBLISHED" => Some(BookStatus::Published),
            "ARCHIVED" => Some(BookStatus::Archived),
            _ => None,
        }
    }
}

/// Chapter ingestion status. Transitions one way only:
/// EMPTY -> UNANALYZED -> ANALYZED. The pipeline owns the first transition;
/// the annotation workflow owns the second.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChapterStatus {
    Empty,
    Unanalyzed,
    Analyzed,
}

impl ChapterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterStatus::Empty => "EMPTY",
            ChapterStatus::Unanalyzed => "UNANALYZED",
            ChapterStatus::Analyzed => "ANALYZED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EMPTY" => Some(ChapterStatus::Empty),
            "UNANALYZED" => Some(ChapterStatus::Unanalyzed),
            "ANALYZED" => Some(ChapterStatus::Analyzed),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub status: BookStatus,
    pub fanqie_book_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: i64,
    pub book_id: i64,
    pub title: String,
    pub index: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: i64,
    pub book_id: i64,
    pub volume_id: i64,
    pub title: String,
    pub index: i64,
    pub fanqie_chapter_id: Option<String>,
    pub status: ChapterStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub id: i64,
    pub chapter_id: i64,
    pub content: String,
    pub order: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_books: i64,
    pub total_chapters: i64,
    pub total_paragraphs: i64,
    pub empty_chapters: i64,
    pub unanalyzed_chapters: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_status_round_trips() {
        for s in [
            ChapterStatus::Empty,
            ChapterStatus::Unanalyzed,
            ChapterStatus::Analyzed,
        ] {
            assert_eq!(ChapterStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ChapterStatus::parse("DOWNLOADED"), None);
    }

    #[test]
    fn chapter_status_orders_forward() {
        assert!(ChapterStatus::Empty < ChapterStatus::Unanalyzed);
        assert!(ChapterStatus::Unanalyzed < ChapterStatus::Analyzed);
    }
}
