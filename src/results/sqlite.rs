use super::{AnalysisResult, CreateOutcome, ResultStore, ResultStoreError};
use crate::config::Config;
use crate::identity::DocumentId;
use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const IN_MEMORY: &str = ":memory:";

/// SQLite-backed [`ResultStore`] with a unique constraint on the document identity.
#[derive(Clone)]
pub struct SqliteResultStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteResultStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ResultStoreError> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, ResultStoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Open the database named by `RESULT_DATABASE_PATH`.
    pub fn from_config(config: &Config) -> Result<Self, ResultStoreError> {
        let store = if config.result_database_path == IN_MEMORY {
            Self::open_in_memory()?
        } else {
            Self::open(&config.result_database_path)?
        };
        tracing::info!(path = %config.result_database_path, "Result store opened");
        Ok(store)
    }

    fn with_connection(conn: Connection) -> Result<Self, ResultStoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_results (
                document_id TEXT NOT NULL UNIQUE,
                summary_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T, ResultStoreError>
    where
        F: FnOnce(&Connection) -> Result<T, ResultStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ResultStoreError::Unavailable("connection mutex poisoned".into()))?;
            op(&guard)
        })
        .await
        .map_err(|error| ResultStoreError::Unavailable(error.to_string()))?
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn find_by_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<AnalysisResult>, ResultStoreError> {
        let key = id.as_str().to_string();
        self.run(move |conn| select(conn, &key)).await
    }

    async fn create(
        &self,
        id: &DocumentId,
        summary_text: &str,
    ) -> Result<CreateOutcome, ResultStoreError> {
        let key = id.as_str().to_string();
        let summary = summary_text.to_string();
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|error| ResultStoreError::Corrupt(error.to_string()))?;

        let outcome = self
            .run(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO analysis_results (document_id, summary_text, created_at) \
                     VALUES (?1, ?2, ?3) ON CONFLICT(document_id) DO NOTHING",
                    params![key, summary, created_at],
                )?;
                let stored = select(conn, &key)?.ok_or_else(|| {
                    ResultStoreError::Corrupt(format!("row for {key} vanished after insert"))
                })?;
                Ok(if inserted == 0 {
                    CreateOutcome::AlreadyExists(stored)
                } else {
                    CreateOutcome::Created(stored)
                })
            })
            .await?;

        match &outcome {
            CreateOutcome::Created(_) => {
                tracing::debug!(document_id = %id, "Analysis result stored")
            }
            CreateOutcome::AlreadyExists(_) => {
                tracing::info!(document_id = %id, "Analysis result already existed; keeping it")
            }
        }
        Ok(outcome)
    }
}

fn select(conn: &Connection, key: &str) -> Result<Option<AnalysisResult>, ResultStoreError> {
    let row = conn
        .query_row(
            "SELECT document_id, summary_text, created_at FROM analysis_results \
             WHERE document_id = ?1",
            [key],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(document_id, summary_text, created_at)| {
        let created_at = OffsetDateTime::parse(&created_at, &Rfc3339).map_err(|error| {
            ResultStoreError::Corrupt(format!("created_at for {document_id}: {error}"))
        })?;
        Ok(AnalysisResult {
            document_id,
            summary_text,
            created_at,
        })
    })
    .transpose()
}

impl From<rusqlite::Error> for ResultStoreError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => Self::Corrupt(error.to_string()),
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::NotADatabase =>
            {
                Self::Corrupt(error.to_string())
            }
            _ => Self::Unavailable(error.to_string()),
        }
    }
}
