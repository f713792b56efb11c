//! SQLite backend.
//!
//! One database file, two tables:
//! - `identities`: one row per user
//! - `records`: every list-shaped record, discriminated by `category`
//!
//! Timestamps are stored as fixed-width RFC 3339 text so lexical order is
//! chronological order. Embeddings are little-endian `f32` blobs.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use contextweave_core::error::StoreError;
use contextweave_core::record::{
    Action, Connection, Document, Experiment, ExperimentStatus, GeneratedArtifact,
    IdentityProfile, Insight, Topic,
};
use contextweave_core::store::{RecordQuery, RecordStore, SortOrder};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::seed::SeedData;
use crate::vector::{blob_to_embedding, embedding_to_blob};

const INSIGHT: &str = "insight";
const DOCUMENT: &str = "document";
const EXPERIMENT: &str = "experiment";
const ACTION: &str = "action";
const TOPIC: &str = "topic";
const CONNECTION: &str = "connection";
const ARTIFACT: &str = "artifact";

/// A SQLite-backed [`RecordStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database at `path` and run migrations.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = path == ":memory:";
        let mut options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Connection(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to ":memory:" is a separate database, so pin one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite record store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS identities (
                user_id       TEXT PRIMARY KEY NOT NULL,
                statement     TEXT,
                values_json   TEXT NOT NULL DEFAULT '[]',
                current_focus TEXT,
                phase         TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("identities table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      TEXT NOT NULL,
                category     TEXT NOT NULL,
                id           TEXT NOT NULL,
                title        TEXT NOT NULL,
                body         TEXT NOT NULL DEFAULT '',
                created_at   TEXT NOT NULL,
                completed_at TEXT,
                status       TEXT,
                kind         TEXT,
                relationship TEXT,
                hypothesis   TEXT,
                tags         TEXT NOT NULL DEFAULT '[]',
                embedding    BLOB,
                UNIQUE (user_id, category, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("records table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_user_category_created \
             ON records(user_id, category, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Write one user's seed data, replacing rows with the same id.
    ///
    /// Runs in a single transaction. Returns the number of list records written.
    pub async fn import(&self, user_id: &str, data: &SeedData) -> Result<usize, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::ImportFailed(format!("begin: {e}")))?;

        if let Some(identity) = &data.identity {
            let values_json = serde_json::to_string(&identity.values)
                .map_err(|e| StoreError::ImportFailed(format!("values serialization: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO identities (user_id, statement, values_json, current_focus, phase)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id) DO UPDATE SET
                    statement = excluded.statement,
                    values_json = excluded.values_json,
                    current_focus = excluded.current_focus,
                    phase = excluded.phase
                "#,
            )
            .bind(user_id)
            .bind(&identity.statement)
            .bind(&values_json)
            .bind(&identity.current_focus)
            .bind(&identity.phase)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::ImportFailed(format!("identity: {e}")))?;
        }

        for r in &data.insights {
            let mut row = RowData::new(INSIGHT, &r.id, &r.title, &r.body, r.created_at);
            row.tags = serde_json::to_string(&r.tags)
                .map_err(|e| StoreError::ImportFailed(format!("tags serialization: {e}")))?;
            row.embedding = r.embedding.as_deref().map(embedding_to_blob);
            insert_row(&mut tx, user_id, row).await?;
        }
        for r in &data.documents {
            let mut row = RowData::new(DOCUMENT, &r.id, &r.title, &r.body, r.created_at);
            row.kind = r.kind.as_deref();
            row.embedding = r.embedding.as_deref().map(embedding_to_blob);
            insert_row(&mut tx, user_id, row).await?;
        }
        for r in &data.experiments {
            let mut row = RowData::new(EXPERIMENT, &r.id, &r.title, &r.body, r.created_at);
            row.status = Some(r.status.as_str());
            row.hypothesis = r.hypothesis.as_deref();
            row.embedding = r.embedding.as_deref().map(embedding_to_blob);
            insert_row(&mut tx, user_id, row).await?;
        }
        for r in &data.actions {
            let mut row = RowData::new(ACTION, &r.id, &r.title, &r.body, r.created_at);
            row.completed_at = r.completed_at.map(timestamp);
            insert_row(&mut tx, user_id, row).await?;
        }
        for r in &data.topics {
            insert_row(
                &mut tx,
                user_id,
                RowData::new(TOPIC, &r.id, &r.title, &r.body, r.created_at),
            )
            .await?;
        }
        for r in &data.connections {
            let mut row = RowData::new(CONNECTION, &r.id, &r.title, &r.body, r.created_at);
            row.relationship = r.relationship.as_deref();
            insert_row(&mut tx, user_id, row).await?;
        }
        for r in &data.artifacts {
            let mut row = RowData::new(ARTIFACT, &r.id, &r.title, "", r.created_at);
            row.kind = Some(r.kind.as_str());
            insert_row(&mut tx, user_id, row).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::ImportFailed(format!("commit: {e}")))?;

        let count = data.record_count();
        info!(user_id, records = count, "Imported records");
        Ok(count)
    }

    /// Run a category query. `statuses` and `kind` narrow the rows when set.
    async fn fetch(
        &self,
        user_id: &str,
        category: &'static str,
        query: &RecordQuery,
        statuses: &[ExperimentStatus],
        kind: Option<&str>,
    ) -> Result<Vec<SqliteRow>, StoreError> {
        let time_col = if category == ACTION {
            "COALESCE(completed_at, created_at)"
        } else {
            "created_at"
        };
        let direction = match query.order {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        };

        let mut sql = String::from("SELECT * FROM records WHERE user_id = ? AND category = ?");
        if query.since.is_some() {
            sql.push_str(&format!(" AND {time_col} >= ?"));
        }
        if !statuses.is_empty() {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({placeholders})"));
        }
        if kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        sql.push_str(&format!(" ORDER BY {time_col} {direction}, id ASC LIMIT ?"));

        let mut db_query = sqlx::query(&sql).bind(user_id).bind(category);
        if let Some(since) = query.since {
            db_query = db_query.bind(timestamp(since));
        }
        for status in statuses {
            db_query = db_query.bind(status.as_str());
        }
        if let Some(kind) = kind {
            db_query = db_query.bind(kind);
        }

        db_query
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error(category, e))
    }
}

/// Column values for one `records` row.
struct RowData<'a> {
    category: &'static str,
    id: &'a str,
    title: &'a str,
    body: &'a str,
    created_at: String,
    completed_at: Option<String>,
    status: Option<&'static str>,
    kind: Option<&'a str>,
    relationship: Option<&'a str>,
    hypothesis: Option<&'a str>,
    tags: String,
    embedding: Option<Vec<u8>>,
}

impl<'a> RowData<'a> {
    fn new(
        category: &'static str,
        id: &'a str,
        title: &'a str,
        body: &'a str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            category,
            id,
            title,
            body,
            created_at: timestamp(created_at),
            completed_at: None,
            status: None,
            kind: None,
            relationship: None,
            hypothesis: None,
            tags: "[]".into(),
            embedding: None,
        }
    }
}

async fn insert_row(
    conn: &mut SqliteConnection,
    user_id: &str,
    row: RowData<'_>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO records (user_id, category, id, title, body, created_at, completed_at,
                             status, kind, relationship, hypothesis, tags, embedding)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(user_id, category, id) DO UPDATE SET
            title = excluded.title,
            body = excluded.body,
            created_at = excluded.created_at,
            completed_at = excluded.completed_at,
            status = excluded.status,
            kind = excluded.kind,
            relationship = excluded.relationship,
            hypothesis = excluded.hypothesis,
            tags = excluded.tags,
            embedding = excluded.embedding
        "#,
    )
    .bind(user_id)
    .bind(row.category)
    .bind(row.id)
    .bind(row.title)
    .bind(row.body)
    .bind(&row.created_at)
    .bind(&row.completed_at)
    .bind(row.status)
    .bind(row.kind)
    .bind(row.relationship)
    .bind(row.hypothesis)
    .bind(&row.tags)
    .bind(row.embedding.as_deref())
    .execute(conn)
    .await
    .map_err(|e| StoreError::ImportFailed(format!("{} {}: {e}", row.category, row.id)))?;
    Ok(())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_error(category: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Query {
        category: category.to_string(),
        reason: e.to_string(),
    }
}

// --- Row parsing ---

fn text(row: &SqliteRow, column: &str, category: &str) -> Result<String, StoreError> {
    row.try_get(column)
        .map_err(|e| query_error(category, format!("{column} column: {e}")))
}

fn opt_text(row: &SqliteRow, column: &str, category: &str) -> Result<Option<String>, StoreError> {
    row.try_get(column)
        .map_err(|e| query_error(category, format!("{column} column: {e}")))
}

fn parse_time(raw: &str, category: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| query_error(category, format!("bad timestamp '{raw}': {e}")))
}

fn created_at(row: &SqliteRow, category: &str) -> Result<DateTime<Utc>, StoreError> {
    parse_time(&text(row, "created_at", category)?, category)
}

fn embedding(row: &SqliteRow) -> Option<Vec<f32>> {
    row.try_get::<Option<Vec<u8>>, _>("embedding")
        .ok()
        .flatten()
        .map(|blob| blob_to_embedding(&blob))
        .filter(|v| !v.is_empty())
}

fn row_to_insight(row: &SqliteRow) -> Result<Insight, StoreError> {
    let tags_json = text(row, "tags", INSIGHT)?;
    Ok(Insight {
        id: text(row, "id", INSIGHT)?,
        title: text(row, "title", INSIGHT)?,
        body: text(row, "body", INSIGHT)?,
        created_at: created_at(row, INSIGHT)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        embedding: embedding(row),
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document, StoreError> {
    Ok(Document {
        id: text(row, "id", DOCUMENT)?,
        title: text(row, "title", DOCUMENT)?,
        body: text(row, "body", DOCUMENT)?,
        created_at: created_at(row, DOCUMENT)?,
        kind: opt_text(row, "kind", DOCUMENT)?,
        embedding: embedding(row),
    })
}

fn row_to_experiment(row: &SqliteRow) -> Result<Experiment, StoreError> {
    let raw_status = opt_text(row, "status", EXPERIMENT)?.unwrap_or_default();
    let status = ExperimentStatus::parse(&raw_status)
        .ok_or_else(|| query_error(EXPERIMENT, format!("unknown status '{raw_status}'")))?;
    Ok(Experiment {
        id: text(row, "id", EXPERIMENT)?,
        title: text(row, "title", EXPERIMENT)?,
        body: text(row, "body", EXPERIMENT)?,
        created_at: created_at(row, EXPERIMENT)?,
        status,
        hypothesis: opt_text(row, "hypothesis", EXPERIMENT)?,
        embedding: embedding(row),
    })
}

fn row_to_action(row: &SqliteRow) -> Result<Action, StoreError> {
    let completed_at = opt_text(row, "completed_at", ACTION)?
        .map(|raw| parse_time(&raw, ACTION))
        .transpose()?;
    Ok(Action {
        id: text(row, "id", ACTION)?,
        title: text(row, "title", ACTION)?,
        body: text(row, "body", ACTION)?,
        created_at: created_at(row, ACTION)?,
        completed_at,
    })
}

fn row_to_topic(row: &SqliteRow) -> Result<Topic, StoreError> {
    Ok(Topic {
        id: text(row, "id", TOPIC)?,
        title: text(row, "title", TOPIC)?,
        body: text(row, "body", TOPIC)?,
        created_at: created_at(row, TOPIC)?,
    })
}

fn row_to_connection(row: &SqliteRow) -> Result<Connection, StoreError> {
    Ok(Connection {
        id: text(row, "id", CONNECTION)?,
        title: text(row, "title", CONNECTION)?,
        body: text(row, "body", CONNECTION)?,
        created_at: created_at(row, CONNECTION)?,
        relationship: opt_text(row, "relationship", CONNECTION)?,
    })
}

fn row_to_artifact(row: &SqliteRow) -> Result<GeneratedArtifact, StoreError> {
    Ok(GeneratedArtifact {
        id: text(row, "id", ARTIFACT)?,
        kind: opt_text(row, "kind", ARTIFACT)?.unwrap_or_default(),
        title: text(row, "title", ARTIFACT)?,
        created_at: created_at(row, ARTIFACT)?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn identity(&self, user_id: &str) -> Result<Option<IdentityProfile>, StoreError> {
        let row = sqlx::query("SELECT * FROM identities WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("identity", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let values_json = text(&row, "values_json", "identity")?;
        Ok(Some(IdentityProfile {
            statement: opt_text(&row, "statement", "identity")?,
            values: serde_json::from_str(&values_json).unwrap_or_default(),
            current_focus: opt_text(&row, "current_focus", "identity")?,
            phase: opt_text(&row, "phase", "identity")?,
        }))
    }

    async fn insights(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Insight>, StoreError> {
        let rows = self.fetch(user_id, INSIGHT, query, &[], None).await?;
        rows.iter().map(row_to_insight).collect()
    }

    async fn documents(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = self.fetch(user_id, DOCUMENT, query, &[], None).await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn experiments(
        &self,
        user_id: &str,
        statuses: &[ExperimentStatus],
        query: &RecordQuery,
    ) -> Result<Vec<Experiment>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.fetch(user_id, EXPERIMENT, query, statuses, None).await?;
        rows.iter().map(row_to_experiment).collect()
    }

    async fn actions(&self, user_id: &str, query: &RecordQuery) -> Result<Vec<Action>, StoreError> {
        let rows = self.fetch(user_id, ACTION, query, &[], None).await?;
        rows.iter().map(row_to_action).collect()
    }

    async fn topics(&self, user_id: &str, query: &RecordQuery) -> Result<Vec<Topic>, StoreError> {
        let rows = self.fetch(user_id, TOPIC, query, &[], None).await?;
        rows.iter().map(row_to_topic).collect()
    }

    async fn connections(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Connection>, StoreError> {
        let rows = self.fetch(user_id, CONNECTION, query, &[], None).await?;
        rows.iter().map(row_to_connection).collect()
    }

    async fn artifacts(
        &self,
        user_id: &str,
        kind: Option<&str>,
        query: &RecordQuery,
    ) -> Result<Vec<GeneratedArtifact>, StoreError> {
        let rows = self.fetch(user_id, ARTIFACT, query, &[], kind).await?;
        rows.iter().map(row_to_artifact).collect()
    }
}
