use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::documents::repo::{Document, DocumentStatus};

/// Query string for GET /documents.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub filetype: Option<String>,
    pub sort: Option<String>,
}

impl ListQuery {
    /// Page is 1-based; limit defaults to 12 and is clamped to 1..=100.
    pub fn page_and_limit(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(12).clamp(1, 100);
        (page, limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Newest,
    Popular,
    Title,
}

impl SortKey {
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("popular") => Self::Popular,
            Some("title") => Self::Title,
            _ => Self::Newest,
        }
    }

    pub fn order_clause(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY d.created_at DESC",
            Self::Popular => " ORDER BY d.download_count DESC, d.created_at DESC",
            Self::Title => " ORDER BY d.title ASC",
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_documents: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            current_page: page,
            total_pages,
            total_documents: total,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploaderInfo {
    pub id: Uuid,
    pub name: String,
}

/// Document as exposed over the API. The stored file path stays internal;
/// clients get a download URL instead.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub original_file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub download_url: String,
    pub uploaded_by: UploaderInfo,
    pub status: DocumentStatus,
    pub download_count: i64,
    pub view_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarked: Option<bool>,
}

impl DocumentResponse {
    pub fn from_document(d: Document, bookmarked: Option<bool>) -> Self {
        Self {
            download_url: format!("/api/documents/{}/download", d.id),
            id: d.id,
            title: d.title,
            description: d.description,
            category: d.category,
            keywords: d.keywords,
            original_file_name: d.original_file_name,
            file_type: d.file_type,
            file_size: d.file_size,
            uploaded_by: UploaderInfo {
                id: d.uploaded_by,
                name: d.uploader_name,
            },
            status: d.status,
            download_count: d.download_count,
            view_count: d.view_count,
            created_at: d.created_at,
            updated_at: d.updated_at,
            bookmarked,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentResponse>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub keywords: Option<String>, // comma-separated, like the upload form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_has_no_next() {
        // 25 documents, 12 per page -> 3 pages, remainder of 1 on page 3
        let meta = PaginationMeta::new(3, 12, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn middle_page_has_both_neighbours() {
        let meta = PaginationMeta::new(2, 12, 25);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn first_page_of_exact_fit() {
        let meta = PaginationMeta::new(1, 10, 20);
        assert_eq!(meta.total_pages, 2);
        assert!(meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn empty_result_set() {
        let meta = PaginationMeta::new(1, 12, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn page_and_limit_are_normalized() {
        let q = ListQuery {
            page: Some(0),
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(q.page_and_limit(), (1, 100));
        assert_eq!(ListQuery::default().page_and_limit(), (1, 12));
    }

    #[test]
    fn sort_key_parsing_defaults_to_newest() {
        assert_eq!(SortKey::parse(Some("popular")), SortKey::Popular);
        assert_eq!(SortKey::parse(Some("title")), SortKey::Title);
        assert_eq!(SortKey::parse(Some("bogus")), SortKey::Newest);
        assert_eq!(SortKey::parse(None), SortKey::Newest);
    }
}
