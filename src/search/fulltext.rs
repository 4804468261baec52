//! SQLite FTS5 full-text channel.
//!
//! One virtual table holds every chunk; ranking uses the built-in `bm25()`
//! function, negated so that larger scores mean better matches.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::types::{Channel, FullTextQuery, SearchResult, SourceEntry};
use super::FullTextSearch;
use crate::core::config::settings::FullTextSettings;
use crate::core::errors::ApiError;

/// A chunk as written by the ingestion side.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub record_id: String,
    pub body: String,
    pub source_id: String,
    pub source_name: String,
    pub chunk_index: Option<u32>,
}

pub struct SqliteFtsStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteFtsStore {
    pub async fn from_settings(settings: &FullTextSettings, root: &Path) -> Result<Self, ApiError> {
        let path = PathBuf::from(&settings.database_path);
        let path = if path.is_absolute() { path } else { root.join(path) };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }
        Self::with_path(path, &settings.table).await
    }

    pub async fn with_path(db_path: PathBuf, table: &str) -> Result<Self, ApiError> {
        if !is_identifier(table) {
            return Err(ApiError::BadRequest(format!("invalid full-text table name '{}'", table)));
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Creates the FTS5 table when it does not exist yet.
    pub async fn create_index(&self) -> Result<(), ApiError> {
        let sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5(
                body,
                record_id UNINDEXED,
                source_id UNINDEXED,
                source_name UNINDEXED,
                chunk_index UNINDEXED,
                tokenize = 'unicode61 remove_diacritics 2'
            )",
            self.table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn index_chunk(&self, chunk: &IndexedChunk) -> Result<(), ApiError> {
        let sql = format!(
            "INSERT INTO {} (body, record_id, source_id, source_name, chunk_index)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&chunk.body)
            .bind(&chunk.record_id)
            .bind(&chunk.source_id)
            .bind(&chunk.source_name)
            .bind(chunk.chunk_index.map(i64::from))
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    fn row_to_result(row: &sqlx::sqlite::SqliteRow) -> SearchResult {
        let rank: f64 = row.try_get("bm25_rank").unwrap_or(0.0);
        let position: Option<i64> = row.try_get("chunk_index").ok().flatten();
        SearchResult {
            text: row.try_get("body").unwrap_or_default(),
            source_id: row.try_get("source_id").unwrap_or_default(),
            source_name: row.try_get("source_name").unwrap_or_default(),
            record_id: row.try_get::<Option<String>, _>("record_id").ok().flatten(),
            channel: Channel::FullText,
            relevance_score: -rank as f32,
            position_hint: position.and_then(|p| u32::try_from(p).ok()),
        }
    }
}

#[async_trait]
impl FullTextSearch for SqliteFtsStore {
    async fn ensure_index(&self) -> Result<(), ApiError> {
        let exists: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
                .bind(&self.table)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::upstream)?;

        match exists {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound(format!(
                "full-text index '{}' does not exist",
                self.table
            ))),
        }
    }

    async fn query(&self, query: &FullTextQuery) -> Result<Vec<SearchResult>, ApiError> {
        let Some(expression) = match_expression(&query.phrase) else {
            return Ok(Vec::new());
        };

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT body, record_id, source_id, source_name, chunk_index, bm25({t}) AS bm25_rank
             FROM {t} WHERE {t} MATCH ",
            t = self.table
        ));
        builder.push_bind(expression);

        if !query.sources.is_empty() {
            builder.push(" AND (source_name IN (");
            {
                let mut names = builder.separated(", ");
                for source in &query.sources {
                    names.push_bind(source.clone());
                }
            }
            builder.push(") OR source_id IN (");
            {
                let mut ids = builder.separated(", ");
                for source in &query.sources {
                    ids.push_bind(source.clone());
                }
            }
            builder.push("))");
        }

        builder.push(" ORDER BY bm25_rank LIMIT ");
        builder.push_bind(query.limit as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::upstream)?;

        Ok(rows.iter().map(Self::row_to_result).collect())
    }

    async fn list_sources(&self) -> Result<Vec<SourceEntry>, ApiError> {
        let sql = format!(
            "SELECT DISTINCT source_id, source_name FROM {} ORDER BY source_name",
            self.table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::upstream)?;

        Ok(rows
            .iter()
            .map(|row| SourceEntry {
                id: row.try_get("source_id").unwrap_or_default(),
                name: row.try_get("source_name").unwrap_or_default(),
            })
            .collect())
    }
}

/// Turns a free-form phrase into an FTS5 query: every word is quoted so
/// punctuation and FTS operators in user text cannot break the syntax.
pub(crate) fn match_expression(phrase: &str) -> Option<String> {
    let terms: Vec<String> = phrase
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
