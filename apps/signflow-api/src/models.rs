//! Data models for the Signflow API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signflow_core::{Document, SignatureBox, Signer, SignerStatus};
use sqlx::FromRow;

/// `documents` table row.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub title: String,
    pub file_url: String,
    pub file_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            title: row.title,
            file_url: row.file_url,
            file_name: row.file_name,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

/// `document_signers` table row.
#[derive(Debug, Clone, FromRow)]
pub struct SignerRow {
    pub id: String,
    pub document_id: String,
    pub signer_id: String,
    pub signer_email: String,
    pub signature_data: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl From<SignerRow> for Signer {
    fn from(row: SignerRow) -> Self {
        let status = match row.status.as_str() {
            "signed" => SignerStatus::Signed,
            _ => SignerStatus::Pending,
        };
        Signer {
            id: row.id,
            document_id: row.document_id,
            signer_id: row.signer_id,
            signer_email: row.signer_email,
            signature_data: row.signature_data,
            signed_at: row.signed_at,
            status,
        }
    }
}

/// `signature_boxes` table row.
#[derive(Debug, Clone, FromRow)]
pub struct BoxRow {
    pub id: String,
    pub document_id: String,
    pub signer_email: String,
    pub page: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub aspect_ratio: f64,
}

impl From<BoxRow> for SignatureBox {
    fn from(row: BoxRow) -> Self {
        // Rows were validated at creation time; the cast only guards
        // against a hand-edited store.
        SignatureBox {
            id: row.id,
            document_id: row.document_id,
            signer_email: row.signer_email,
            page: row.page.max(1) as u32,
            x: row.x,
            y: row.y,
            width: row.width,
            aspect_ratio: row.aspect_ratio,
        }
    }
}

/// Box placement supplied when creating a document.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxSpec {
    pub signer_email: String,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub aspect_ratio: f64,
}

/// Signer assignment supplied when creating a document.
#[derive(Debug, Clone, Deserialize)]
pub struct SignerSpec {
    pub email: String,
    /// Resolved identity id; falls back to the email when the identity
    /// provider has no account yet.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to create a document with assigned boxes.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub file_url: String,
    pub file_name: String,
    pub created_by: String,
    #[serde(default)]
    pub creator_name: Option<String>,
    pub signers: Vec<SignerSpec>,
    pub boxes: Vec<BoxSpec>,
}

/// Document with its signers and (scoped) boxes.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub document: Document,
    pub signers: Vec<Signer>,
    pub boxes: Vec<SignatureBox>,
    pub complete: bool,
    /// The requesting signer's reusable signature, when scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_signature: Option<String>,
}

/// Query parameters for the document view.
#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    /// Scope the response to this signer's own boxes.
    #[serde(default)]
    pub signer: Option<String>,
}

/// Request to submit a signature.
#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub signer_email: String,
    pub signature_data: Option<String>,
    /// Refresh the user's reusable saved signature alongside signing.
    #[serde(default = "default_true")]
    pub save_for_reuse: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SignResponse {
    pub success: bool,
    pub document_complete: bool,
}

/// Body for `POST /notify`. Fields are optional so missing required
/// ones surface as a 400 rather than a deserialization error.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub to: Option<String>,
    #[serde(rename = "signerName")]
    pub signer_name: Option<String>,
    #[serde(rename = "documentTitle")]
    pub document_title: Option<String>,
    #[serde(rename = "documentUrl")]
    pub document_url: Option<String>,
    #[serde(rename = "creatorName")]
    pub creator_name: Option<String>,
}

/// `user_signatures` table row / response.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SavedSignatureRow {
    pub user_id: String,
    pub signature_data: String,
    pub updated_at: DateTime<Utc>,
}

/// Body for `PUT /api/signatures/:user_id`.
#[derive(Debug, Deserialize)]
pub struct SavedSignatureUpsert {
    pub signature_data: String,
}
