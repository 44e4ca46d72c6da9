//! Embedded SQLite backends over an sqlx connection pool.
//!
//! Sentences live as JSON token arrays in the `sentences` table; an
//! inverted index (`sentence_lemmas`, `sentence_labels`) serves
//! candidate retrieval through `INTERSECT` queries paginated by rowid.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use tracing::debug;

use crate::error::{Result, SegrobError};
use crate::sentence::{labels_contain, Doc, DocId, DocMeta, Sentence, Token};
use crate::storage::{Cursor, DocRepository, OnCandidate, TopicRepository};
use crate::topic::{Library, Topic, TopicExpr};

const DOCS_SCHEMA: &str = include_str!("../../sql/docs.sql");
const TOPICS_SCHEMA: &str = include_str!("../../sql/topics.sql");

const BUSY_TIMEOUT: Duration = Duration::from_millis(200);

/// Page cache in SQLite units: negative values are KiB, so -2000 is 2 MiB.
const CACHE_SIZE: &str = "-2000";

/// Open (creating if missing) the database at `path` with a pool sized
/// to the CPU count. Every connection starts in WAL mode with
/// `synchronous=NORMAL`, a busy timeout, foreign keys on and a 2 MiB
/// page cache.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        .pragma("cache_size", CACHE_SIZE);

    let pool_size = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1) as u32;

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size)
        .connect_with(options)
        .await?;

    debug!(path = %path.display(), pool_size, "opened sqlite pool");
    Ok(pool)
}

/// Execute the idempotent document schema script.
pub async fn create_doc_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(DOCS_SCHEMA).execute(pool).await?;
    debug!("doc schema ready");
    Ok(())
}

/// Execute the idempotent topic schema script.
pub async fn create_topic_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(TOPICS_SCHEMA).execute(pool).await?;
    debug!("topic schema ready");
    Ok(())
}

/// Document store over the `docs`/`sentences` tables and the inverted
/// lemma/label index.
pub struct SqliteDocStore {
    pool: SqlitePool,
}

impl SqliteDocStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteDocStore { pool }
    }

    /// One `INTERSECT` subquery per lemma and per label, each bounded by
    /// the cursor, with a trailing LIMIT. Binding order follows the
    /// subquery order: (value, cursor) pairs, then the limit.
    fn candidate_query(lemmas: &[String], labels: &[String]) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(lemmas.len() + labels.len());
        for _ in lemmas {
            parts.push("SELECT sentence_rowid FROM sentence_lemmas WHERE lemma = ? AND sentence_rowid > ?");
        }
        for _ in labels {
            parts.push("SELECT sentence_rowid FROM sentence_labels WHERE label = ? AND sentence_rowid > ?");
        }
        let mut query = parts.join(" INTERSECT ");
        query.push_str(" LIMIT ?");
        query
    }
}

#[async_trait]
impl DocRepository for SqliteDocStore {
    async fn list(&self, label_match: &str) -> Result<Vec<DocMeta>> {
        let rows = sqlx::query("SELECT id, title, labels FROM docs ORDER BY title")
            .fetch_all(&self.pool)
            .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let labels = split_labels(row.get::<Option<String>, _>("labels"));
            if !labels_contain(&labels, label_match) {
                continue;
            }
            docs.push(DocMeta {
                id: row.get::<i64, _>("id"),
                title: row.get::<String, _>("title"),
                labels,
            });
        }
        Ok(docs)
    }

    async fn read(&self, id: DocId) -> Result<Doc> {
        let doc_row = sqlx::query("SELECT title, labels FROM docs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SegrobError::NotFound(format!("doc not found: {id}")))?;

        let mut doc = Doc {
            id,
            title: doc_row.get::<String, _>("title"),
            labels: split_labels(doc_row.get::<Option<String>, _>("labels")),
            sentences: Vec::new(),
        };

        let rows = sqlx::query(
            "SELECT sentence_id, data FROM sentences WHERE doc_id = ? ORDER BY sentence_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let tokens: Vec<Token> = serde_json::from_str(row.get::<String, _>("data").as_str())?;
            doc.sentences.push(Sentence {
                id: row.get::<i64, _>("sentence_id"),
                doc_id: id,
                tokens,
            });
        }
        Ok(doc)
    }

    async fn labels(&self, pattern: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT labels FROM docs")
            .fetch_all(&self.pool)
            .await?;

        let mut labels: Vec<String> = Vec::new();
        for row in rows {
            for label in split_labels(row.get::<Option<String>, _>("labels")) {
                if !pattern.is_empty() && !label.contains(pattern) {
                    continue;
                }
                if !labels.iter().any(|l| l == &label) {
                    labels.push(label);
                }
            }
        }
        labels.sort();
        Ok(labels)
    }

    async fn find_candidates(
        &self,
        lemmas: &[String],
        labels: &[String],
        after: Cursor,
        limit: usize,
        on_candidate: OnCandidate<'_>,
    ) -> Result<Cursor> {
        if lemmas.is_empty() {
            return Ok(after);
        }

        let query = Self::candidate_query(lemmas, labels);
        let mut q = sqlx::query_as::<_, (i64,)>(&query);
        for lemma in lemmas {
            q = q.bind(lemma).bind(after);
        }
        for label in labels {
            q = q.bind(label).bind(after);
        }
        q = q.bind(limit as i64);

        let row_ids: Vec<i64> = q
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id,)| id)
            .collect();

        if row_ids.is_empty() {
            // unchanged cursor: end of stream
            return Ok(after);
        }

        // Hydrate the candidate set. The ids come from the database, so
        // inlining them keeps this a single round trip without dynamic
        // bind counting.
        let id_list = row_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let hydrate = format!(
            "SELECT rowid AS rowid, doc_id, sentence_id, data FROM sentences WHERE rowid IN ({id_list}) ORDER BY rowid"
        );

        let rows = sqlx::query(&hydrate).fetch_all(&self.pool).await?;
        debug!(candidates = rows.len(), after, "candidate batch");

        let mut next_cursor = after;
        for row in rows {
            let rowid = row.get::<i64, _>("rowid");
            if rowid > next_cursor {
                next_cursor = rowid;
            }
            let tokens: Vec<Token> = serde_json::from_str(row.get::<String, _>("data").as_str())?;
            on_candidate(Sentence {
                id: row.get::<i64, _>("sentence_id"),
                doc_id: row.get::<i64, _>("doc_id"),
                tokens,
            })?;
        }

        Ok(next_cursor)
    }

    /// Transactional write: the document row, one `sentences` row per
    /// sentence, one `sentence_lemmas` row per unique lemma and one
    /// `sentence_labels` row per document label. `BEGIN IMMEDIATE`
    /// acquires the write lock up front so concurrent writers fail fast
    /// instead of deadlocking mid-transaction.
    async fn write(&self, doc: &Doc) -> Result<DocId> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = write_doc_tx(&mut conn, doc).await;
        match result {
            Ok(id) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(id)
            }
            Err(err) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(err)
            }
        }
    }
}

async fn write_doc_tx(conn: &mut sqlx::SqliteConnection, doc: &Doc) -> Result<DocId> {
    let labels = doc.labels.join(",");
    let doc_id = sqlx::query("INSERT INTO docs (title, labels) VALUES (?, ?)")
        .bind(&doc.title)
        .bind(&labels)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    for sentence in &doc.sentences {
        let data = serde_json::to_string(&sentence.tokens)?;
        let sentence_rowid =
            sqlx::query("INSERT INTO sentences (doc_id, sentence_id, data) VALUES (?, ?, ?)")
                .bind(doc_id)
                .bind(sentence.id)
                .bind(&data)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();

        let mut lemmas: Vec<&str> = Vec::new();
        for token in &sentence.tokens {
            if !token.lemma.is_empty() && !lemmas.contains(&token.lemma.as_str()) {
                lemmas.push(&token.lemma);
            }
        }
        for lemma in lemmas {
            sqlx::query("INSERT INTO sentence_lemmas (lemma, sentence_rowid) VALUES (?, ?)")
                .bind(lemma)
                .bind(sentence_rowid)
                .execute(&mut *conn)
                .await?;
        }

        for label in &doc.labels {
            sqlx::query("INSERT INTO sentence_labels (label, sentence_rowid) VALUES (?, ?)")
                .bind(label)
                .bind(sentence_rowid)
                .execute(&mut *conn)
                .await?;
        }
    }

    debug!(doc_id, title = %doc.title, sentences = doc.sentences.len(), "wrote doc");
    Ok(doc_id)
}

fn split_labels(raw: Option<String>) -> Vec<String> {
    match raw {
        Some(raw) => raw
            .split(',')
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Topic store over the `topics` table. Application-managed topics live
/// in the `user_id IS NULL` rows; the expressions are one JSON array per
/// topic, the same shape as the filesystem files.
pub struct SqliteTopicStore {
    pool: SqlitePool,
}

impl SqliteTopicStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteTopicStore { pool }
    }
}

#[async_trait]
impl TopicRepository for SqliteTopicStore {
    async fn read(&self, name: &str) -> Result<Topic> {
        let row = sqlx::query("SELECT exprs FROM topics WHERE user_id IS NULL AND name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SegrobError::NotFound(format!("topic not found: {name}")))?;

        let exprs: Vec<TopicExpr> = serde_json::from_str(row.get::<String, _>("exprs").as_str())?;
        let mut topic = Topic {
            name: name.to_string(),
            exprs,
        };
        topic.stamp_items();
        Ok(topic)
    }

    async fn read_all(&self) -> Result<Library> {
        let rows =
            sqlx::query("SELECT name, exprs FROM topics WHERE user_id IS NULL ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        let mut topics = Vec::with_capacity(rows.len());
        for row in rows {
            let exprs: Vec<TopicExpr> =
                serde_json::from_str(row.get::<String, _>("exprs").as_str())?;
            let mut topic = Topic {
                name: row.get::<String, _>("name"),
                exprs,
            };
            topic.stamp_items();
            topics.push(topic);
        }
        Ok(Library(topics))
    }

    /// Upsert as update-then-insert in one immediate transaction.
    /// `UNIQUE(user_id, name)` never conflicts for NULL `user_id`
    /// (SQLite treats NULLs as distinct), so `ON CONFLICT` can not
    /// implement the replace semantics here.
    async fn write(&self, topic: &Topic) -> Result<()> {
        let exprs = serde_json::to_string(&topic.exprs)?;

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = async {
            let updated = sqlx::query(
                "UPDATE topics SET exprs = ?, updated = strftime('%Y-%m-%dT%H:%M:%SZ', 'now') \
                 WHERE user_id IS NULL AND name = ?",
            )
            .bind(&exprs)
            .bind(&topic.name)
            .execute(&mut *conn)
            .await?
            .rows_affected();

            if updated == 0 {
                sqlx::query("INSERT INTO topics (user_id, name, exprs) VALUES (NULL, ?, ?)")
                    .bind(&topic.name)
                    .bind(&exprs)
                    .execute(&mut *conn)
                    .await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(())
            }
            Err(err) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(err)
            }
        }
    }
}
