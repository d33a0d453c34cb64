//! Compositing error taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to parse PDF: {0}")]
    MalformedDocument(String),

    #[error("box references page {page} but the document has {page_count} pages")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("invalid signature image: {0}")]
    InvalidSignatureImage(String),

    #[error("failed to serialize PDF: {0}")]
    SerializationError(String),
}
