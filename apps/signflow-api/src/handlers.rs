//! HTTP handlers for the Signflow API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use signflow_core::{
    compose, document_complete, png_from_data_url, ComposeError, Signer, SignatureBox,
    SigningSession,
};

use crate::email::Notification;
use crate::error::ApiError;
use crate::models::*;
use crate::state::{AppState, CompositeGuard};

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Create a document with assigned signature boxes and pending signers.
///
/// Signers may be listed explicitly; any box email without a matching
/// entry becomes a signer with the email standing in for the identity
/// id. Notification emails are fired in the background - a send failure
/// never fails document creation.
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::InvalidRequest("title must not be empty".into()));
    }
    if req.file_url.is_empty() || req.file_name.is_empty() {
        return Err(ApiError::InvalidRequest(
            "file_url and file_name are required".into(),
        ));
    }
    if req.created_by.is_empty() {
        return Err(ApiError::InvalidRequest("created_by is required".into()));
    }
    if req.boxes.is_empty() {
        return Err(ApiError::InvalidRequest(
            "at least one signature box is required".into(),
        ));
    }

    let document_id = Uuid::new_v4().to_string();

    // Validate every box at the boundary; malformed geometry never
    // reaches the store.
    let mut boxes = Vec::with_capacity(req.boxes.len());
    for spec in &req.boxes {
        let bx = SignatureBox::new(
            document_id.clone(),
            spec.signer_email.clone(),
            spec.page,
            spec.x,
            spec.y,
            spec.width,
            spec.aspect_ratio,
        )
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        boxes.push(bx);
    }

    // Explicit signer list first, then any box-only emails.
    let mut signer_specs: Vec<SignerSpec> = req.signers.clone();
    for bx in &boxes {
        if !signer_specs.iter().any(|s| s.email == bx.signer_email) {
            signer_specs.push(SignerSpec {
                email: bx.signer_email.clone(),
                user_id: None,
                name: None,
            });
        }
    }

    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO documents (id, title, file_url, file_name, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&document_id)
    .bind(&req.title)
    .bind(&req.file_url)
    .bind(&req.file_name)
    .bind(&req.created_by)
    .bind(now.to_rfc3339())
    .execute(&state.db)
    .await?;

    for bx in &boxes {
        sqlx::query(
            r#"
            INSERT INTO signature_boxes
                (id, document_id, signer_email, page, x, y, width, aspect_ratio, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&bx.id)
        .bind(&bx.document_id)
        .bind(&bx.signer_email)
        .bind(bx.page as i64)
        .bind(bx.x)
        .bind(bx.y)
        .bind(bx.width)
        .bind(bx.aspect_ratio)
        .bind(now.to_rfc3339())
        .execute(&state.db)
        .await?;
    }

    let mut signers = Vec::with_capacity(signer_specs.len());
    for spec in &signer_specs {
        let signer = Signer {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.clone(),
            signer_id: spec.user_id.clone().unwrap_or_else(|| spec.email.clone()),
            signer_email: spec.email.clone(),
            signature_data: None,
            signed_at: None,
            status: signflow_core::SignerStatus::Pending,
        };
        sqlx::query(
            r#"
            INSERT INTO document_signers
                (id, document_id, signer_id, signer_email, signature_data, signed_at, status, created_at)
            VALUES (?, ?, ?, ?, NULL, NULL, 'pending', ?)
            "#,
        )
        .bind(&signer.id)
        .bind(&signer.document_id)
        .bind(&signer.signer_id)
        .bind(&signer.signer_email)
        .bind(now.to_rfc3339())
        .execute(&state.db)
        .await?;
        signers.push(signer);
    }

    tracing::info!(
        "Created document {} with {} boxes, {} signers",
        document_id,
        boxes.len(),
        signers.len()
    );

    notify_signers_in_background(&state, &req, &signer_specs, &document_id);

    let document = signflow_core::Document {
        id: document_id,
        title: req.title,
        file_url: req.file_url,
        file_name: req.file_name,
        created_by: req.created_by,
        created_at: now,
    };

    Ok(Json(DocumentResponse {
        document,
        signers,
        boxes,
        complete: false,
        saved_signature: None,
    }))
}

fn notify_signers_in_background(
    state: &Arc<AppState>,
    req: &CreateDocumentRequest,
    signer_specs: &[SignerSpec],
    document_id: &str,
) {
    if state.email.is_none() {
        return;
    }
    let creator_name = req
        .creator_name
        .clone()
        .unwrap_or_else(|| req.created_by.clone());
    let notes: Vec<Notification> = signer_specs
        .iter()
        .map(|spec| Notification {
            to: spec.email.clone(),
            signer_name: spec
                .name
                .clone()
                .unwrap_or_else(|| email_prefix(&spec.email)),
            document_title: req.title.clone(),
            document_url: format!("{}/sign/{}", state.base_url, document_id),
            creator_name: creator_name.clone(),
        })
        .collect();

    let state = Arc::clone(state);
    tokio::spawn(async move {
        let Some(email) = &state.email else { return };
        for note in notes {
            if let Err(e) = email.send_notification(&note).await {
                // Secondary effect: log and move on.
                tracing::warn!("Failed to notify {}: {}", note.to, e);
            }
        }
    });
}

fn email_prefix(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// Fetch a document with its signers and boxes.
///
/// With `?signer=email` the response is scoped through the signing
/// workflow: the signer must be assigned and still pending, and only
/// their own boxes are returned. This check runs server-side regardless
/// of what any client-side filter showed.
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = load_document(&state, &id).await?;
    let signers: Vec<Signer> = load_signers(&state, &id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let boxes: Vec<SignatureBox> = load_boxes(&state, &id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let complete = document_complete(&signers);

    match query.signer {
        Some(signer_email) => {
            let saved = load_saved_signature_for_email(&state, &signers, &signer_email).await?;
            let session = SigningSession::open(
                document.into(),
                &signers,
                &boxes,
                &signer_email,
                saved.clone(),
            )?;
            Ok(Json(DocumentResponse {
                document: session.document().clone(),
                signers,
                boxes: session.boxes().to_vec(),
                complete,
                saved_signature: saved.map(|s| s.signature_data),
            }))
        }
        None => Ok(Json(DocumentResponse {
            document: document.into(),
            signers,
            boxes,
            complete,
            saved_signature: None,
        })),
    }
}

/// Submit a signature for one signer, transitioning them to `signed`.
pub async fn sign_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SignRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    let document = load_document(&state, &id).await?;
    let signers: Vec<Signer> = load_signers(&state, &id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let boxes: Vec<SignatureBox> = load_boxes(&state, &id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let session = SigningSession::open(document.into(), &signers, &boxes, &req.signer_email, None)?;
    let submission = session.submit(req.signature_data, req.save_for_reuse, Utc::now())?;

    // Refresh the reusable signature first; if the signer update below
    // fails the dangling saved signature is harmless and the next
    // attempt simply re-saves. A failure here never blocks signing.
    if let Some(saved) = &submission.saved_signature {
        let result = sqlx::query(
            r#"
            INSERT INTO user_signatures (user_id, signature_data, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                signature_data = excluded.signature_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&saved.user_id)
        .bind(&saved.signature_data)
        .bind(saved.updated_at.to_rfc3339())
        .execute(&state.db)
        .await;
        if let Err(e) = result {
            tracing::warn!("Failed to save signature for reuse: {}", e);
        }
    }

    // The status predicate makes the update optimistic: a concurrent
    // submit for the same signer loses the race instead of silently
    // double-writing.
    let updated = sqlx::query(
        r#"
        UPDATE document_signers
        SET signature_data = ?, signed_at = ?, status = 'signed'
        WHERE document_id = ? AND signer_email = ? AND status = 'pending'
        "#,
    )
    .bind(&submission.signer.signature_data)
    .bind(submission.signer.signed_at.map(|t| t.to_rfc3339()))
    .bind(&id)
    .bind(&req.signer_email)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(signflow_core::WorkflowError::AlreadySigned.into());
    }

    let remaining: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM document_signers
        WHERE document_id = ? AND status = 'pending'
        "#,
    )
    .bind(&id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        "Signer {} signed document {}; {} still pending",
        req.signer_email,
        id,
        remaining
    );

    Ok(Json(SignResponse {
        success: true,
        document_complete: remaining == 0,
    }))
}

/// Download the final signed PDF.
///
/// Only available once every signer has signed; refuses to start a
/// second composite while one is outstanding for the same document.
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, [(String, String); 2], Vec<u8>), ApiError> {
    let document = load_document(&state, &id).await?;
    let signers: Vec<Signer> = load_signers(&state, &id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    if signers.is_empty() || !document_complete(&signers) {
        return Err(ApiError::DocumentIncomplete);
    }

    let _guard = CompositeGuard::acquire(&state, &id).ok_or(ApiError::CompositeInFlight)?;

    let boxes: Vec<SignatureBox> = load_boxes(&state, &id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let mut signatures: HashMap<String, Vec<u8>> = HashMap::new();
    for signer in &signers {
        if let Some(data_url) = &signer.signature_data {
            let png = png_from_data_url(data_url).ok_or_else(|| {
                ComposeError::InvalidSignatureImage(format!(
                    "stored signature for {} is not a PNG data URI",
                    signer.signer_email
                ))
            })?;
            signatures.insert(signer.signer_email.clone(), png);
        }
    }

    let pdf_bytes = fetch_document_bytes(&document.file_url).await?;
    let signed = compose(&pdf_bytes, &boxes, &signatures)?;

    tracing::info!(
        "Composed signed PDF for document {} ({} bytes)",
        id,
        signed.len()
    );

    Ok((
        StatusCode::OK,
        [
            (
                "Content-Type".to_string(),
                "application/pdf".to_string(),
            ),
            (
                "Content-Disposition".to_string(),
                format!("attachment; filename=\"signed-{}\"", document.file_name),
            ),
        ],
        signed,
    ))
}

/// Retrieve the original PDF from the object store URL. Inline
/// `data:` URLs are resolved locally.
async fn fetch_document_bytes(file_url: &str) -> Result<Vec<u8>, ApiError> {
    if let Some(encoded) = file_url.strip_prefix("data:application/pdf;base64,") {
        return BASE64
            .decode(encoded)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid inline document: {}", e)));
    }
    let response = reqwest::get(file_url)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to fetch document: {}", e)))?;
    if !response.status().is_success() {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "object store returned {} for document",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to read document: {}", e)))?;
    Ok(bytes.to_vec())
}

/// Get a user's reusable saved signature.
pub async fn get_saved_signature(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SavedSignatureRow>, ApiError> {
    let row: Option<SavedSignatureRow> = sqlx::query_as(
        r#"
        SELECT user_id, signature_data, updated_at
        FROM user_signatures
        WHERE user_id = ?
        "#,
    )
    .bind(&user_id)
    .fetch_optional(&state.db)
    .await?;

    row.map(Json)
        .ok_or(ApiError::SavedSignatureNotFound(user_id))
}

/// Overwrite a user's reusable saved signature.
pub async fn put_saved_signature(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<SavedSignatureUpsert>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if png_from_data_url(&req.signature_data).is_none() {
        return Err(ApiError::InvalidRequest(
            "signature_data must be a PNG data URI".into(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO user_signatures (user_id, signature_data, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            signature_data = excluded.signature_data,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&user_id)
    .bind(&req.signature_data)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(Json(json!({ "success": true })))
}

/// Send a "document awaiting your signature" notification.
///
/// Responds 400 when `to`/`documentTitle`/`documentUrl` are missing,
/// `{"success":true}` on send, and 500 with the provider error when the
/// send fails.
pub async fn notify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NotifyRequest>,
) -> impl IntoResponse {
    let (Some(to), Some(document_title), Some(document_url)) =
        (&req.to, &req.document_title, &req.document_url)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required fields" })),
        );
    };

    let Some(email) = &state.email else {
        tracing::error!("Notify requested but email service is not configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Email service not configured" })),
        );
    };

    let note = Notification {
        to: to.clone(),
        signer_name: req.signer_name.clone().unwrap_or_else(|| email_prefix(to)),
        document_title: document_title.clone(),
        document_url: document_url.clone(),
        creator_name: req.creator_name.clone().unwrap_or_else(|| "Signflow".into()),
    };

    match email.send_notification(&note).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(e) => {
            tracing::error!("Failed to send email: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn load_document(state: &AppState, id: &str) -> Result<DocumentRow, ApiError> {
    let row: Option<DocumentRow> = sqlx::query_as(
        r#"
        SELECT id, title, file_url, file_name, created_by, created_at
        FROM documents
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    row.ok_or_else(|| ApiError::DocumentNotFound(id.to_string()))
}

async fn load_signers(state: &AppState, document_id: &str) -> Result<Vec<SignerRow>, ApiError> {
    let rows: Vec<SignerRow> = sqlx::query_as(
        r#"
        SELECT id, document_id, signer_id, signer_email, signature_data, signed_at, status
        FROM document_signers
        WHERE document_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(document_id)
    .fetch_all(&state.db)
    .await?;
    Ok(rows)
}

async fn load_boxes(state: &AppState, document_id: &str) -> Result<Vec<BoxRow>, ApiError> {
    let rows: Vec<BoxRow> = sqlx::query_as(
        r#"
        SELECT id, document_id, signer_email, page, x, y, width, aspect_ratio
        FROM signature_boxes
        WHERE document_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(document_id)
    .fetch_all(&state.db)
    .await?;
    Ok(rows)
}

async fn load_saved_signature_for_email(
    state: &AppState,
    signers: &[Signer],
    signer_email: &str,
) -> Result<Option<signflow_core::SavedSignature>, ApiError> {
    let Some(signer) = signers.iter().find(|s| s.signer_email == signer_email) else {
        return Ok(None);
    };
    let row: Option<SavedSignatureRow> = sqlx::query_as(
        r#"
        SELECT user_id, signature_data, updated_at
        FROM user_signatures
        WHERE user_id = ?
        "#,
    )
    .bind(&signer.signer_id)
    .fetch_optional(&state.db)
    .await?;
    Ok(row.map(|r| signflow_core::SavedSignature {
        user_id: r.user_id,
        signature_data: r.signature_data,
        updated_at: r.updated_at,
    }))
}
