use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::documents::dto::SortKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "document_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

/// Document row joined with the uploader's name. `uploaded_by` is set once at
/// insert and no update statement in this module touches it.
#[derive(Debug, Clone, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub file_path: String,
    pub original_file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_by: Uuid,
    pub status: DocumentStatus,
    pub download_count: i64,
    pub view_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub uploader_name: String,
}

#[derive(Debug)]
pub struct NewDocument {
    pub title: String,
    pub description: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub file_path: String,
    pub original_file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_by: Uuid,
}

#[derive(Debug, Default)]
pub struct ListFilters {
    pub search: Option<String>,
    pub category: Option<String>,
    pub filetype: Option<String>,
}

const DOC_COLUMNS: &str = "d.id, d.title, d.description, d.category, d.keywords, d.file_path, \
     d.original_file_name, d.file_type, d.file_size, d.uploaded_by, d.status, \
     d.download_count, d.view_count, d.created_at, d.updated_at, u.name AS uploader_name";

/// Only approved documents are publicly listed; search is a case-insensitive
/// substring match over title, description and each keyword.
fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filters: &'a ListFilters) {
    qb.push(" WHERE d.status = ").push_bind(DocumentStatus::Approved);
    if let Some(search) = &filters.search {
        let pattern = format!("%{search}%");
        qb.push(" AND (d.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(d.keywords) kw WHERE kw ILIKE ")
            .push_bind(pattern)
            .push("))");
    }
    if let Some(category) = &filters.category {
        qb.push(" AND d.category = ").push_bind(category.as_str());
    }
    if let Some(filetype) = &filters.filetype {
        qb.push(" AND d.file_type = ").push_bind(filetype.to_lowercase());
    }
}

pub async fn list(
    db: &PgPool,
    filters: &ListFilters,
    sort: SortKey,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Document>> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {DOC_COLUMNS} FROM documents d JOIN users u ON u.id = d.uploaded_by"
    ));
    push_filters(&mut qb, filters);
    qb.push(sort.order_clause());
    qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    let rows = qb.build_query_as::<Document>().fetch_all(db).await?;
    Ok(rows)
}

pub async fn count(db: &PgPool, filters: &ListFilters) -> anyhow::Result<i64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM documents d");
    push_filters(&mut qb, filters);
    let total = qb.build_query_scalar::<i64>().fetch_one(db).await?;
    Ok(total)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Document>> {
    let doc = sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOC_COLUMNS} FROM documents d JOIN users u ON u.id = d.uploaded_by WHERE d.id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(doc)
}

pub async fn create(db: &PgPool, new: NewDocument) -> anyhow::Result<Document> {
    let doc = sqlx::query_as::<_, Document>(&format!(
        r#"
        WITH d AS (
            INSERT INTO documents
                (title, description, category, keywords, file_path,
                 original_file_name, file_type, file_size, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
        )
        SELECT {DOC_COLUMNS} FROM d JOIN users u ON u.id = d.uploaded_by
        "#
    ))
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.category)
    .bind(&new.keywords)
    .bind(&new.file_path)
    .bind(&new.original_file_name)
    .bind(&new.file_type)
    .bind(new.file_size)
    .bind(new.uploaded_by)
    .fetch_one(db)
    .await?;
    Ok(doc)
}

/// Metadata-only update; the owner, counters and file fields are untouched.
pub async fn update_metadata(
    db: &PgPool,
    id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
    keywords: Option<Vec<String>>,
) -> anyhow::Result<Option<Document>> {
    let doc = sqlx::query_as::<_, Document>(&format!(
        r#"
        WITH d AS (
            UPDATE documents
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                keywords = COALESCE($5, keywords),
                updated_at = now()
            WHERE id = $1
            RETURNING *
        )
        SELECT {DOC_COLUMNS} FROM d JOIN users u ON u.id = d.uploaded_by
        "#
    ))
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(category)
    .bind(keywords)
    .fetch_optional(db)
    .await?;
    Ok(doc)
}

/// Removes the metadata row and hands back the stored file name so the caller
/// can clean up the file afterwards.
pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<Option<String>> {
    let file_path =
        sqlx::query_scalar::<_, String>("DELETE FROM documents WHERE id = $1 RETURNING file_path")
            .bind(id)
            .fetch_optional(db)
            .await?;
    Ok(file_path)
}

/// Single-statement increment so concurrent views each count exactly once.
pub async fn increment_view(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Document>> {
    let doc = sqlx::query_as::<_, Document>(&format!(
        r#"
        WITH d AS (
            UPDATE documents SET view_count = view_count + 1 WHERE id = $1 RETURNING *
        )
        SELECT {DOC_COLUMNS} FROM d JOIN users u ON u.id = d.uploaded_by
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(doc)
}

pub async fn increment_download(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE documents SET download_count = download_count + 1 WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Flips the bookmark and returns the new state (true = now bookmarked).
pub async fn toggle_bookmark(db: &PgPool, user_id: Uuid, document_id: Uuid) -> anyhow::Result<bool> {
    let inserted = sqlx::query(
        "INSERT INTO bookmarks (user_id, document_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(document_id)
    .execute(db)
    .await?
    .rows_affected();

    if inserted > 0 {
        return Ok(true);
    }
    sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND document_id = $2")
        .bind(user_id)
        .bind(document_id)
        .execute(db)
        .await?;
    Ok(false)
}

/// Which of `ids` the user has bookmarked, for list personalization.
pub async fn bookmarked_set(
    db: &PgPool,
    user_id: Uuid,
    ids: &[Uuid],
) -> anyhow::Result<HashSet<Uuid>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = sqlx::query_scalar::<_, Uuid>(
        "SELECT document_id FROM bookmarks WHERE user_id = $1 AND document_id = ANY($2)",
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn list_bookmarks(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Document>> {
    let rows = sqlx::query_as::<_, Document>(&format!(
        r#"
        SELECT {DOC_COLUMNS}
        FROM bookmarks b
        JOIN documents d ON d.id = b.document_id
        JOIN users u ON u.id = d.uploaded_by
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
