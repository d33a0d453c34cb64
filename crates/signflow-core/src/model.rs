//! Domain model for documents, signers and signature boxes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geometry;

/// Errors rejected at the box-construction boundary.
///
/// Geometry operations are total over constructed boxes, so every
/// numeric precondition is checked exactly once, here.
#[derive(Debug, Error, PartialEq)]
pub enum BoxError {
    #[error("aspect ratio must be positive, got {0}")]
    InvalidAspectRatio(f64),

    #[error("box cannot fit on the page at aspect ratio {0}")]
    DoesNotFit(f64),

    #[error("page index is 1-based, got {0}")]
    InvalidPage(u32),

    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
}

/// Placement of one signer's signature on one page.
///
/// `x`/`y` are the box *center* in percent of page width/height, `width`
/// is percent of page width, and the height is always derived as
/// `width / aspect_ratio` - it is never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureBox {
    pub id: String,
    pub document_id: String,
    pub signer_email: String,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub aspect_ratio: f64,
}

impl SignatureBox {
    /// Validate and construct a box, assigning a fresh id.
    ///
    /// Width is clamped into the allowed range and the center is clamped
    /// so the bounding rectangle stays inside the page. Returns an error
    /// for a non-positive aspect ratio, an aspect ratio so small that no
    /// allowed width fits the page height, a zero page index, or
    /// non-finite coordinates.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: impl Into<String>,
        signer_email: impl Into<String>,
        page: u32,
        x: f64,
        y: f64,
        width: f64,
        aspect_ratio: f64,
    ) -> Result<Self, BoxError> {
        if !x.is_finite() {
            return Err(BoxError::NonFinite("x"));
        }
        if !y.is_finite() {
            return Err(BoxError::NonFinite("y"));
        }
        if !width.is_finite() {
            return Err(BoxError::NonFinite("width"));
        }
        if !aspect_ratio.is_finite() {
            return Err(BoxError::NonFinite("aspect_ratio"));
        }
        if aspect_ratio <= 0.0 {
            return Err(BoxError::InvalidAspectRatio(aspect_ratio));
        }
        // Even the narrowest allowed box would be taller than the page.
        if geometry::max_width_pct(aspect_ratio) < geometry::MIN_WIDTH_PCT {
            return Err(BoxError::DoesNotFit(aspect_ratio));
        }
        if page == 0 {
            return Err(BoxError::InvalidPage(page));
        }

        let width = geometry::clamp_width(width, aspect_ratio);
        let half_w = width / 2.0;
        let half_h = width / aspect_ratio / 2.0;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            signer_email: signer_email.into(),
            page,
            x: geometry::clamp_axis(x, half_w),
            y: geometry::clamp_axis(y, half_h),
            width,
            aspect_ratio,
        })
    }

    /// Box height in percent of page height.
    pub fn height_pct(&self) -> f64 {
        self.width / self.aspect_ratio
    }
}

/// Signer lifecycle: `pending` until the one terminal transition to
/// `signed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerStatus {
    Pending,
    Signed,
}

impl std::fmt::Display for SignerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerStatus::Pending => write!(f, "pending"),
            SignerStatus::Signed => write!(f, "signed"),
        }
    }
}

/// A party assigned to sign a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signer {
    pub id: String,
    pub document_id: String,
    pub signer_id: String,
    pub signer_email: String,
    /// PNG data URI, present once signed.
    pub signature_data: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub status: SignerStatus,
}

/// An uploaded document awaiting signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub file_url: String,
    pub file_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A user's reusable signature image; at most one per user, overwritten
/// on each re-save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSignature {
    pub user_id: String,
    pub signature_data: String,
    pub updated_at: DateTime<Utc>,
}
