//! libSQL storage layer for the local upload cache and publication history.
//!
//! The [`Storage`] struct wraps a local libSQL database. The pipeline is the
//! sole writer; reporting commands open it with [`Storage::open_readonly`].

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tokenlist_shared::{Result, TokenListError, Version};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// One row of the publication history.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationRecord {
    pub id: String,
    pub list_name: String,
    pub version: Version,
    /// `None` for dry runs that never reached the content store.
    pub content_id: Option<String>,
    /// SHA-256 of the published JSON document.
    pub sha256: String,
    pub token_count: usize,
    pub published_at: DateTime<Utc>,
}

fn storage_err(e: impl std::fmt::Display) -> TokenListError {
    TokenListError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TokenListError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode (for reporting commands).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    TokenListError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TokenListError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Upload cache
    // -----------------------------------------------------------------------

    /// Look up the content id previously uploaded under `cache_key`.
    pub async fn cached_upload(&self, cache_key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content_id FROM upload_cache WHERE cache_key = ?1",
                params![cache_key],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Remember that `cache_key` is available as `content_id` (upserts).
    pub async fn remember_upload(&self, cache_key: &str, content_id: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO upload_cache (cache_key, content_id, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(cache_key) DO UPDATE SET
                   content_id = excluded.content_id,
                   created_at = excluded.created_at",
                params![cache_key, content_id, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Publication history
    // -----------------------------------------------------------------------

    /// Record a list version handed to the publisher. Returns the row id.
    pub async fn record_publication(
        &self,
        list_name: &str,
        version: Version,
        content_id: Option<&str>,
        sha256: &str,
        token_count: usize,
    ) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO publications
                   (id, list_name, major, minor, patch, content_id, sha256, token_count, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.as_str(),
                    list_name,
                    i64::from(version.major),
                    i64::from(version.minor),
                    i64::from(version.patch),
                    content_id,
                    sha256,
                    token_count as i64,
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Publication history for a list, newest first.
    pub async fn list_publications(
        &self,
        list_name: &str,
        limit: u32,
    ) -> Result<Vec<PublicationRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, list_name, major, minor, patch, content_id, sha256, token_count, published_at
                 FROM publications WHERE list_name = ?1
                 ORDER BY published_at DESC, id DESC LIMIT ?2",
                params![list_name, i64::from(limit)],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_publication(&row)?);
        }
        Ok(results)
    }

    /// The most recent publication of a list, if any.
    pub async fn last_publication(&self, list_name: &str) -> Result<Option<PublicationRecord>> {
        Ok(self.list_publications(list_name, 1).await?.into_iter().next())
    }
}

fn row_to_publication(row: &libsql::Row) -> Result<PublicationRecord> {
    let int = |idx: i32| -> Result<i64> { row.get::<i64>(idx).map_err(storage_err) };
    Ok(PublicationRecord {
        id: row.get::<String>(0).map_err(storage_err)?,
        list_name: row.get::<String>(1).map_err(storage_err)?,
        version: Version::new(int(2)? as u32, int(3)? as u32, int(4)? as u32),
        content_id: row.get::<String>(5).ok(),
        sha256: row.get::<String>(6).map_err(storage_err)?,
        token_count: int(7)? as usize,
        published_at: {
            let s: String = row.get(8).map_err(storage_err)?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| TokenListError::Storage(format!("invalid date: {e}")))?
        },
    })
}
