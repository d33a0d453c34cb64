//! Signature placement and PDF compositing
//!
//! This crate provides the core of the Signflow e-signature system:
//! the geometry model that maps percentage-coordinate signature boxes
//! onto PDF pages, the in-memory box registry used while placing boxes,
//! freehand signature capture, and the compositor that embeds accepted
//! signature images into the original PDF.
//!
//! All I/O (store, object storage, email) lives in the API server; this
//! crate is pure logic over bytes and in-memory state.

pub mod capture;
pub mod compositor;
pub mod error;
pub mod geometry;
pub mod model;
pub mod registry;
pub mod workflow;

pub use capture::{png_from_data_url, SignaturePad};
pub use compositor::compose;
pub use error::ComposeError;
pub use geometry::{apply_drag, apply_resize, pixel_rect, Corner, PixelRect};
pub use model::{BoxError, Document, SavedSignature, SignatureBox, Signer, SignerStatus};
pub use registry::BoxRegistry;
pub use workflow::{document_complete, SigningSession, Submission, WorkflowError};
