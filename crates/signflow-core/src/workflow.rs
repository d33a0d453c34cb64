//! Signing workflow state machine
//!
//! Per signer the lifecycle is `pending -> signed`, terminal. The
//! session here is pure: it validates entry, scopes the box set to the
//! requesting signer, and turns a submitted signature into the records
//! to persist. The API server does the surrounding I/O and is the sole
//! layer presenting errors to users.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Document, SavedSignature, SignatureBox, Signer, SignerStatus};

#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error("not a signer for this document")]
    NotASigner,

    #[error("document already signed by this signer")]
    AlreadySigned,

    #[error("a signature is required before submitting")]
    SignatureRequired,
}

/// A pending signer's view of a document: their own boxes only, plus
/// any reusable signature they saved earlier.
#[derive(Debug, Clone)]
pub struct SigningSession {
    document: Document,
    signer: Signer,
    boxes: Vec<SignatureBox>,
    saved_signature: Option<SavedSignature>,
}

/// Records produced by a successful submit, for the caller to persist.
#[derive(Debug, Clone)]
pub struct Submission {
    pub signer: Signer,
    pub saved_signature: Option<SavedSignature>,
}

impl SigningSession {
    /// Open a signing session for one signer.
    ///
    /// Rejects users who are not signers of the document, and signers
    /// whose status is already `signed` - there is no overwrite path.
    /// The exposed box set is filtered to the signer's own boxes; other
    /// signers' boxes are never shown.
    pub fn open(
        document: Document,
        signers: &[Signer],
        boxes: &[SignatureBox],
        signer_email: &str,
        saved_signature: Option<SavedSignature>,
    ) -> Result<Self, WorkflowError> {
        let signer = signers
            .iter()
            .find(|s| s.signer_email == signer_email)
            .ok_or(WorkflowError::NotASigner)?
            .clone();
        if signer.status == SignerStatus::Signed {
            return Err(WorkflowError::AlreadySigned);
        }
        let boxes = boxes
            .iter()
            .filter(|b| b.signer_email == signer_email)
            .cloned()
            .collect();
        Ok(Self {
            document,
            signer,
            boxes,
            saved_signature,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// The signer's own boxes, in insertion order.
    pub fn boxes(&self) -> &[SignatureBox] {
        &self.boxes
    }

    pub fn saved_signature(&self) -> Option<&SavedSignature> {
        self.saved_signature.as_ref()
    }

    /// Submit a captured or reused signature, consuming the session.
    ///
    /// Returns the signed signer record and, when `save_for_reuse` is
    /// set, the refreshed SavedSignature. Persisting both is the
    /// caller's single logical transaction; if only the saved signature
    /// lands the signer stays `pending` and the next attempt re-saves.
    pub fn submit(
        self,
        signature_data: Option<String>,
        save_for_reuse: bool,
        now: DateTime<Utc>,
    ) -> Result<Submission, WorkflowError> {
        let data = signature_data
            .filter(|d| !d.is_empty())
            .ok_or(WorkflowError::SignatureRequired)?;

        let saved_signature = save_for_reuse.then(|| SavedSignature {
            user_id: self.signer.signer_id.clone(),
            signature_data: data.clone(),
            updated_at: now,
        });

        let signer = Signer {
            signature_data: Some(data),
            signed_at: Some(now),
            status: SignerStatus::Signed,
            ..self.signer
        };

        Ok(Submission {
            signer,
            saved_signature,
        })
    }
}

/// A document is complete once every associated signer has signed.
pub fn document_complete(signers: &[Signer]) -> bool {
    signers.iter().all(|s| s.status == SignerStatus::Signed)
}
