//! Storage contracts for documents and topics.
//!
//! Two interchangeable backends implement these traits: a filesystem
//! store over one JSON file per document/topic, and an embedded SQLite
//! store with an inverted lemma index. Both honor the same cursor
//! pagination protocol, so the search orchestrator is backend agnostic.

pub mod filesystem;
pub mod sqlite;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::sentence::{Doc, DocId, DocMeta, Sentence};
use crate::topic::{Library, Topic};

/// Opaque pagination token.
///
/// Monotone non-decreasing per stream: a `find_candidates` call returns a
/// cursor `>=` the one passed in, and an unchanged cursor signals end of
/// stream. Backends may use the row identifier of their storage engine;
/// callers must not interpret the value.
pub type Cursor = i64;

/// Candidate sink for [`DocRepository::find_candidates`]. Returning an
/// error aborts the stream; the repository stops invoking the callback
/// and propagates the error unchanged. The next call with the same
/// cursor is safe.
pub type OnCandidate<'a> = &'a mut (dyn FnMut(Sentence) -> Result<()> + Send);

/// Progress sink for [`Preloader::load_nlp`]: `(current, total, title)`.
pub type OnProgress<'a> = &'a mut (dyn FnMut(usize, usize, &str) + Send);

/// Read/write access to a document corpus.
#[async_trait]
pub trait DocRepository: Send + Sync {
    /// Metadata of the documents whose labels contain `label_match` as a
    /// substring. The empty string returns all documents.
    async fn list(&self, label_match: &str) -> Result<Vec<DocMeta>>;

    /// The full document, all sentences included, with `doc.id`,
    /// `doc.title` and every `sentence.doc_id` stamped.
    async fn read(&self, id: DocId) -> Result<Doc>;

    /// Unique labels containing `pattern` as a substring, sorted.
    async fn labels(&self, pattern: &str) -> Result<Vec<String>>;

    /// Stream sentences that contain every one of `lemmas` and belong to
    /// a document carrying every one of `labels` (exact strings), in
    /// ascending cursor order, at most `limit` per call.
    ///
    /// Pass the returned cursor back as `after` to continue; an
    /// unchanged cursor is the end-of-stream signal. A sentence identity
    /// is never emitted twice across a full drain.
    async fn find_candidates(
        &self,
        lemmas: &[String],
        labels: &[String],
        after: Cursor,
        limit: usize,
        on_candidate: OnCandidate<'_>,
    ) -> Result<Cursor>;

    /// Persist a document, assigning its id. Fails with `Conflict` when
    /// a document with the same title exists, or `Unsupported` on a
    /// read-only backend.
    async fn write(&self, doc: &Doc) -> Result<DocId>;

    /// The preloading capability, for backends that hold data in memory.
    /// Consumers that benefit from warm caches invoke it before hot
    /// loops; backends that do not preload return `None`.
    fn preloader(&self) -> Option<&dyn Preloader> {
        None
    }
}

/// Optional capability: eager in-memory loading with progress reporting.
#[async_trait]
pub trait Preloader: Send + Sync {
    /// Load sentence data into memory. With `doc_id` set, only that
    /// document is loaded; otherwise only documents carrying every one
    /// of `labels` (exact strings) are.
    async fn load_nlp(
        &self,
        labels: &[String],
        doc_id: Option<DocId>,
        on_progress: OnProgress<'_>,
    ) -> Result<()>;
}

/// Read/write access to the topic library.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// A single topic by name, with the derived item identity fields
    /// (`topic_name`, `expr_index`, `item_index`) backfilled.
    async fn read(&self, name: &str) -> Result<Topic>;

    /// All topics, identity fields backfilled.
    async fn read_all(&self) -> Result<Library>;

    /// Upsert: a topic with an existing name replaces the previous
    /// definition atomically.
    async fn write(&self, topic: &Topic) -> Result<()>;
}

/// Open the document repository behind `path`: an existing directory
/// selects the filesystem backend, anything else the SQLite backend.
pub async fn open_doc_repository(path: &Path) -> Result<Box<dyn DocRepository>> {
    if path.is_dir() {
        Ok(Box::new(filesystem::FsDocStore::open(path)?))
    } else {
        let pool = sqlite::connect(path).await?;
        Ok(Box::new(sqlite::SqliteDocStore::new(pool)))
    }
}

/// Open the topic repository behind `path`, by the same path-shape rule
/// as [`open_doc_repository`].
pub async fn open_topic_repository(path: &Path) -> Result<Box<dyn TopicRepository>> {
    if path.is_dir() {
        Ok(Box::new(filesystem::FsTopicStore::new(path)))
    } else {
        let pool = sqlite::connect(path).await?;
        Ok(Box::new(sqlite::SqliteTopicStore::new(pool)))
    }
}
