use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::{CurrentUser, MaybeUser},
    documents::{
        dto::{
            DocumentListResponse, DocumentResponse, ListQuery, PaginationMeta, SortKey,
            UpdateDocumentRequest,
        },
        repo::{self, Document, ListFilters, NewDocument},
        services::{content_type_for, parse_keywords, stored_file_name, validate_upload},
    },
    error::ApiError,
    rate_limit,
    response::{ok, ApiResponse},
    state::AppState,
    users::repo::User,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/bookmarks/my", get(my_bookmarks))
        .route(
            "/documents/:id",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/documents/:id/download", get(download_document))
        .route("/documents/:id/bookmark", post(toggle_bookmark))
}

pub fn upload_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/documents", post(create_document))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::upload_limit,
        ))
        // multipart framing needs some headroom beyond the file ceiling
        .layer(DefaultBodyLimit::max(
            state.config.upload.max_file_size + 64 * 1024,
        ))
}

/// Owner-or-admin gate for mutating operations.
fn ensure_owner_or_admin(doc: &Document, user: &User, action: &str) -> Result<(), ApiError> {
    if doc.uploaded_by == user.id || user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Not allowed to {action} this document"
        )))
    }
}

#[instrument(skip(state, caller))]
pub async fn list_documents(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<DocumentListResponse>>, ApiError> {
    let (page, limit) = query.page_and_limit();
    let sort = SortKey::parse(query.sort.as_deref());
    let filters = ListFilters {
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
        category: query.category.clone().filter(|s| !s.is_empty()),
        filetype: query.filetype.clone().filter(|s| !s.is_empty()),
    };

    let docs = repo::list(&state.db, &filters, sort, limit, (page - 1) * limit).await?;
    let total = repo::count(&state.db, &filters).await?;

    // personalize with bookmark flags when the caller is authenticated
    let bookmarked = match &caller {
        Some(user) => {
            let ids: Vec<Uuid> = docs.iter().map(|d| d.id).collect();
            Some(repo::bookmarked_set(&state.db, user.id, &ids).await?)
        }
        None => None,
    };

    let documents = docs
        .into_iter()
        .map(|d| {
            let flag = bookmarked.as_ref().map(|set| set.contains(&d.id));
            DocumentResponse::from_document(d, flag)
        })
        .collect();

    Ok(ok(DocumentListResponse {
        documents,
        pagination: PaginationMeta::new(page, limit, total),
    }))
}

#[instrument(skip(state, caller))]
pub async fn get_document(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DocumentResponse>>, ApiError> {
    let doc = repo::increment_view(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;

    let bookmarked = match &caller {
        Some(user) => Some(
            repo::bookmarked_set(&state.db, user.id, &[id])
                .await?
                .contains(&id),
        ),
        None => None,
    };

    Ok(ok(DocumentResponse::from_document(doc, bookmarked)))
}

#[instrument(skip(state, user, multipart))]
pub async fn create_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<DocumentResponse>>), ApiError> {
    let mut title: Option<String> = None;
    let mut description = String::new();
    let mut category: Option<String> = None;
    let mut keywords: Vec<String> = Vec::new();
    let mut file: Option<(String, Bytes)> = None;

    let bad_body =
        |e: axum::extract::multipart::MultipartError| ApiError::validation(format!("Malformed multipart body: {e}"));

    while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("title") => title = Some(field.text().await.map_err(bad_body)?),
            Some("description") => description = field.text().await.map_err(bad_body)?,
            Some("category") => category = Some(field.text().await.map_err(bad_body)?),
            Some("keywords") => keywords = parse_keywords(&field.text().await.map_err(bad_body)?),
            Some("file") => {
                let original = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_body)?;
                file = Some((original, data));
            }
            _ => {}
        }
    }

    let title = title.map(|t| t.trim().to_string()).unwrap_or_default();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(ApiError::validation(
            "Title is required and must be at most 200 characters",
        ));
    }
    if description.chars().count() > 1000 {
        return Err(ApiError::validation(
            "Description must be at most 1000 characters",
        ));
    }
    let (original_name, data) =
        file.ok_or_else(|| ApiError::validation("Please attach a file to upload"))?;

    // rejected before anything hits disk or the database
    let ext = validate_upload(&state.config.upload, &original_name, data.len())?;

    let stored = stored_file_name(&ext);
    let size = data.len() as i64;
    state.storage.put(&stored, data).await?;

    let doc = repo::create(
        &state.db,
        NewDocument {
            title,
            description,
            category: category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Other".into()),
            keywords,
            file_path: stored,
            original_file_name: original_name,
            file_type: ext,
            file_size: size,
            uploaded_by: user.id,
        },
    )
    .await?;

    info!(document_id = %doc.id, user_id = %user.id, size, "document uploaded");
    Ok((
        StatusCode::CREATED,
        ok(DocumentResponse::from_document(doc, Some(false))),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDocumentRequest>,
) -> Result<Json<ApiResponse<DocumentResponse>>, ApiError> {
    let doc = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;
    ensure_owner_or_admin(&doc, &user, "edit")?;

    let title = payload.title.as_deref().map(str::trim);
    if let Some(t) = title {
        if t.is_empty() || t.chars().count() > 200 {
            return Err(ApiError::validation(
                "Title must be between 1 and 200 characters",
            ));
        }
    }
    if let Some(d) = payload.description.as_deref() {
        if d.chars().count() > 1000 {
            return Err(ApiError::validation(
                "Description must be at most 1000 characters",
            ));
        }
    }

    let updated = repo::update_metadata(
        &state.db,
        id,
        title,
        payload.description.as_deref(),
        payload.category.as_deref(),
        payload.keywords.as_deref().map(parse_keywords),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;

    info!(document_id = %id, user_id = %user.id, "document updated");
    Ok(ok(DocumentResponse::from_document(updated, None)))
}

#[instrument(skip(state, user))]
pub async fn delete_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let doc = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;
    ensure_owner_or_admin(&doc, &user, "delete")?;

    // Row first, file second: a leftover file is harmless garbage, a row
    // without a file breaks every listing that references it.
    let file_path = repo::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;
    if let Err(e) = state.storage.delete(&file_path).await {
        warn!(error = %e, document_id = %id, file = %file_path, "failed to remove stored file");
    }

    info!(document_id = %id, user_id = %user.id, "document deleted");
    Ok(ok(serde_json::json!({"message": "Document deleted"})))
}

#[instrument(skip(state))]
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;

    let data = state
        .storage
        .get(&doc.file_path)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".into()))?;

    repo::increment_download(&state.db, id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&doc.file_type)),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        doc.original_file_name.replace(['"', '\r', '\n'], "_")
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    info!(document_id = %id, "document downloaded");
    Ok((headers, data))
}

#[instrument(skip(state, user))]
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if repo::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("Document not found".into()));
    }

    let bookmarked = repo::toggle_bookmark(&state.db, user.id, id).await?;
    Ok(ok(serde_json::json!({
        "bookmarked": bookmarked,
        "message": if bookmarked { "Bookmark added" } else { "Bookmark removed" },
    })))
}

#[instrument(skip_all)]
pub async fn my_bookmarks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<DocumentResponse>>>, ApiError> {
    let docs = repo::list_bookmarks(&state.db, user.id).await?;
    let documents = docs
        .into_iter()
        .map(|d| DocumentResponse::from_document(d, Some(true)))
        .collect();
    Ok(ok(documents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{documents::repo::DocumentStatus, users::repo::Role};
    use time::OffsetDateTime;

    fn doc_owned_by(owner: Uuid) -> Document {
        Document {
            id: Uuid::new_v4(),
            title: "Quarterly report".into(),
            description: String::new(),
            category: "Other".into(),
            keywords: vec![],
            file_path: "abc.pdf".into(),
            original_file_name: "report.pdf".into(),
            file_type: "pdf".into(),
            file_size: 100,
            uploaded_by: owner,
            status: DocumentStatus::Approved,
            download_count: 0,
            view_count: 0,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
            uploader_name: "Owner".into(),
        }
    }

    fn user_with(id: Uuid, role: Role) -> User {
        User {
            id,
            name: "Someone".into(),
            email: "someone@example.com".into(),
            password_hash: "hash".into(),
            role,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn owner_may_mutate() {
        let owner = Uuid::new_v4();
        let doc = doc_owned_by(owner);
        let user = user_with(owner, Role::User);
        assert!(ensure_owner_or_admin(&doc, &user, "edit").is_ok());
    }

    #[test]
    fn admin_may_mutate_any_document() {
        let doc = doc_owned_by(Uuid::new_v4());
        let admin = user_with(Uuid::new_v4(), Role::Admin);
        assert!(ensure_owner_or_admin(&doc, &admin, "delete").is_ok());
    }

    #[test]
    fn stranger_is_forbidden() {
        let doc = doc_owned_by(Uuid::new_v4());
        let stranger = user_with(Uuid::new_v4(), Role::User);
        let err = ensure_owner_or_admin(&doc, &stranger, "delete").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn download_disposition_strips_quotes() {
        let name = "we\"ird.pdf".replace(['"', '\r', '\n'], "_");
        assert_eq!(name, "we_ird.pdf");
    }
}
