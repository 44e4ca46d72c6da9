//! Filesystem backends: one JSON file per document or topic.
//!
//! Document ids are the positions in the lexicographically sorted
//! directory listing, which makes them deterministic across runs; the
//! filename is the title. The store keeps labels in memory from open
//! time on and loads token data lazily, or eagerly through the
//! [`Preloader`] capability.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SegrobError};
use crate::sentence::{has_all_labels, labels_contain, Doc, DocId, DocMeta, Sentence};
use crate::storage::{Cursor, DocRepository, OnCandidate, OnProgress, Preloader, TopicRepository};
use crate::topic::{Library, Topic, TopicExpr};

const DOC_EXT: &str = "json";

/// In-memory entry per document: metadata always, sentences only after
/// preload.
struct DocEntry {
    meta: DocMeta,
    sentences: Option<Vec<Sentence>>,
}

/// Read-only document store over a directory of JSON files.
pub struct FsDocStore {
    root: PathBuf,
    /// Mutable only during preload; read-only for the rest of the
    /// process lifetime.
    docs: RwLock<Vec<DocEntry>>,
}

/// Labels-only projection used at open time to avoid parsing tokens.
#[derive(Deserialize)]
struct DocLabels {
    #[serde(default)]
    labels: Vec<String>,
}

impl FsDocStore {
    /// Enumerate `*.json` entries of `path`, sorted by filename, assign
    /// sequential ids and read only each file's `labels` key.
    pub fn open(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)?;
        if !meta.is_dir() {
            return Err(SegrobError::Usage(format!(
                "filesystem doc store requires a directory, got file: {}",
                path.display()
            )));
        }

        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if Path::new(&name).extension().is_some_and(|e| e == DOC_EXT) {
                names.push(name);
            }
        }
        names.sort();

        let mut docs = Vec::with_capacity(names.len());
        for (idx, name) in names.into_iter().enumerate() {
            let labels = read_labels(&path.join(&name))?;
            docs.push(DocEntry {
                meta: DocMeta {
                    id: idx as DocId,
                    title: name,
                    labels,
                },
                sentences: None,
            });
        }

        debug!(root = %path.display(), docs = docs.len(), "opened filesystem doc store");
        Ok(FsDocStore {
            root: path.to_path_buf(),
            docs: RwLock::new(docs),
        })
    }

    fn load_doc(&self, id: DocId, title: &str) -> Result<Doc> {
        let file = fs::File::open(self.root.join(title))?;
        let mut doc: Doc = serde_json::from_reader(BufReader::new(file))?;
        doc.id = id;
        doc.title = title.to_string();
        for sentence in &mut doc.sentences {
            sentence.doc_id = id;
        }
        Ok(doc)
    }

    fn check_id(&self, id: DocId) -> Result<()> {
        let len = self.docs.read().len();
        if id < 0 || id as usize >= len {
            return Err(SegrobError::OutOfRange {
                what: "doc",
                id,
                max: len as i64 - 1,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocRepository for FsDocStore {
    async fn list(&self, label_match: &str) -> Result<Vec<DocMeta>> {
        let docs = self.docs.read();
        Ok(docs
            .iter()
            .map(|d| &d.meta)
            .filter(|m| labels_contain(&m.labels, label_match))
            .cloned()
            .collect())
    }

    async fn read(&self, id: DocId) -> Result<Doc> {
        self.check_id(id)?;
        let title = self.docs.read()[id as usize].meta.title.clone();
        self.load_doc(id, &title)
    }

    async fn labels(&self, pattern: &str) -> Result<Vec<String>> {
        let docs = self.docs.read();
        let mut labels: Vec<String> = Vec::new();
        for entry in docs.iter() {
            for label in &entry.meta.labels {
                if !pattern.is_empty() && !label.contains(pattern) {
                    continue;
                }
                if !labels.iter().any(|l| l == label) {
                    labels.push(label.clone());
                }
            }
        }
        labels.sort();
        Ok(labels)
    }

    /// No lemma index exists on this backend: the first call streams
    /// every sentence (the matcher is the filter) and returns cursor 1;
    /// any call with `after > 0` is end of stream. Preloaded documents
    /// stream from memory, the rest are read from disk on the fly.
    async fn find_candidates(
        &self,
        _lemmas: &[String],
        labels: &[String],
        after: Cursor,
        _limit: usize,
        on_candidate: OnCandidate<'_>,
    ) -> Result<Cursor> {
        if after > 0 {
            return Ok(after);
        }

        let len = self.docs.read().len();
        for idx in 0..len {
            let (meta, preloaded) = {
                let docs = self.docs.read();
                let entry = &docs[idx];
                (entry.meta.clone(), entry.sentences.clone())
            };
            if !has_all_labels(&meta.labels, labels) {
                continue;
            }
            let sentences = match preloaded {
                Some(sentences) => sentences,
                None => self.load_doc(meta.id, &meta.title)?.sentences,
            };
            for sentence in sentences {
                on_candidate(sentence)?;
            }
        }

        Ok(1)
    }

    async fn write(&self, _doc: &Doc) -> Result<DocId> {
        Err(SegrobError::Unsupported(
            "filesystem doc store is read-only".to_string(),
        ))
    }

    fn preloader(&self) -> Option<&dyn Preloader> {
        Some(self)
    }
}

#[async_trait]
impl Preloader for FsDocStore {
    async fn load_nlp(
        &self,
        labels: &[String],
        doc_id: Option<DocId>,
        on_progress: OnProgress<'_>,
    ) -> Result<()> {
        let total = self.docs.read().len();
        for idx in 0..total {
            let meta = {
                let docs = self.docs.read();
                docs[idx].meta.clone()
            };

            // doc_id and label filters are exclusive
            if let Some(id) = doc_id {
                if id != meta.id {
                    continue;
                }
            } else if !has_all_labels(&meta.labels, labels) {
                continue;
            }

            on_progress(idx + 1, total, &meta.title);
            let doc = self.load_doc(meta.id, &meta.title)?;
            self.docs.write()[idx].sentences = Some(doc.sentences);
        }

        debug!(total, "preloaded filesystem doc store");
        Ok(())
    }
}

/// Stream-decode only the `labels` key of a document file; token arrays
/// are skipped without being materialized.
fn read_labels(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path)?;
    let labels: DocLabels = serde_json::from_reader(BufReader::new(file))?;
    Ok(labels.labels)
}

/// Topic store over a directory of JSON files, one per topic. The
/// filename without extension is the topic name; the file body is a JSON
/// array of expressions, each an array of items.
pub struct FsTopicStore {
    root: PathBuf,
}

impl FsTopicStore {
    pub fn new(root: &Path) -> Self {
        FsTopicStore {
            root: root.to_path_buf(),
        }
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == DOC_EXT) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl TopicRepository for FsTopicStore {
    async fn read(&self, name: &str) -> Result<Topic> {
        let path = self.root.join(format!("{name}.{DOC_EXT}"));
        let data = fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SegrobError::NotFound(format!("topic not found: {name}"))
            } else {
                SegrobError::Io(err)
            }
        })?;
        let exprs: Vec<TopicExpr> = serde_json::from_slice(&data)?;
        let mut topic = Topic {
            name: name.to_string(),
            exprs,
        };
        topic.stamp_items();
        Ok(topic)
    }

    async fn read_all(&self) -> Result<Library> {
        let mut topics = Vec::new();
        for name in self.names()? {
            topics.push(self.read(&name).await?);
        }
        Ok(Library(topics))
    }

    async fn write(&self, topic: &Topic) -> Result<()> {
        // One expression per line, the layout of the hand-edited topic
        // files this store is shared with.
        let mut lines: Vec<String> = Vec::with_capacity(topic.exprs.len());
        for expr in &topic.exprs {
            lines.push(serde_json::to_string(expr)?);
        }
        let body = format!("[\n\t{}\n]", lines.join(",\n\t"));
        fs::write(self.root.join(format!("{}.{DOC_EXT}", topic.name)), body)?;
        Ok(())
    }
}
