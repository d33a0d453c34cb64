//! Application state for the Signflow API

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::email::EmailClient;

pub struct AppState {
    pub db: SqlitePool,
    pub email: Option<EmailClient>,
    /// Base URL used to build signer-facing document links.
    pub base_url: String,
    /// Documents with a composite currently being produced.
    composing: Mutex<HashSet<String>>,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            let data_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("signflow-api");
            std::fs::create_dir_all(&data_dir).ok();
            format!("sqlite:{}/signflow.db?mode=rwc", data_dir.display())
        });

        let email = EmailClient::from_env();
        if email.is_none() {
            tracing::warn!("RESEND_API_KEY not set; signer notifications disabled");
        }

        let base_url =
            std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Self::with_database_url(&db_url, email, base_url).await
    }

    pub async fn with_database_url(
        db_url: &str,
        email: Option<EmailClient>,
        base_url: String,
    ) -> Result<Self> {
        tracing::info!("Connecting to database: {}", db_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self {
            db: pool,
            email,
            base_url,
            composing: Mutex::new(HashSet::new()),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                file_url TEXT NOT NULL,
                file_name TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signature_boxes (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                signer_email TEXT NOT NULL,
                page INTEGER NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                width REAL NOT NULL,
                aspect_ratio REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_signers (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                signer_id TEXT NOT NULL,
                signer_email TEXT NOT NULL,
                signature_data TEXT,
                signed_at TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_signatures (
                user_id TEXT PRIMARY KEY,
                signature_data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_boxes_document ON signature_boxes(document_id)
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signers_document ON document_signers(document_id)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }
}

/// Clears the in-flight marker when the composite finishes, whether it
/// succeeded or failed.
pub struct CompositeGuard {
    state: Arc<AppState>,
    document_id: String,
}

impl CompositeGuard {
    /// Mark a composite as in flight; `None` if one is already running
    /// for this document.
    pub fn acquire(state: &Arc<AppState>, document_id: &str) -> Option<Self> {
        let mut composing = state
            .composing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !composing.insert(document_id.to_string()) {
            return None;
        }
        Some(Self {
            state: Arc::clone(state),
            document_id: document_id.to_string(),
        })
    }
}

impl Drop for CompositeGuard {
    fn drop(&mut self) {
        self.state
            .composing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.document_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_state() -> Arc<AppState> {
        let path = std::env::temp_dir().join(format!("signflow-state-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite:{}?mode=rwc", path.display());
        Arc::new(
            AppState::with_database_url(&url, None, "http://localhost:3000".into())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn composite_guard_is_exclusive_per_document() {
        let state = test_state().await;

        let guard = CompositeGuard::acquire(&state, "doc-1");
        assert!(guard.is_some());
        // Second composite for the same document is refused...
        assert!(CompositeGuard::acquire(&state, "doc-1").is_none());
        // ...while another document is unaffected.
        let other = CompositeGuard::acquire(&state, "doc-2");
        assert!(other.is_some());

        // Dropping the guard clears the flag.
        drop(guard);
        assert!(CompositeGuard::acquire(&state, "doc-1").is_some());
    }
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
