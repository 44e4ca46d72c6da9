//! Search orchestration: strategy selection and candidate streaming.
//!
//! Two strategies exist. With a pinned document id the repository is
//! read in full and every sentence goes through the matcher. Without
//! one, candidate retrieval runs through the repository's inverted
//! index: sentences containing every positive lemma of an expression
//! stream through a cursor-paginated callback and the matcher filters
//! them down to real matches.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{Result, SegrobError};
use crate::matcher::{sort_matches, Matcher, SentenceMatch};
use crate::sentence::DocId;
use crate::storage::{Cursor, DocRepository};
use crate::topic::{Topic, TopicExpr};

/// Recommended candidate batch size per `find_candidates` call.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Match sink for [`Search::run`]. Returning an error aborts the search
/// and propagates unchanged.
pub type OnMatch<'a> = &'a mut (dyn FnMut(SentenceMatch) -> Result<()> + Send);

/// One search over a document repository, configured with a topic
/// and/or an argument expression.
pub struct Search<'a> {
    repo: &'a dyn DocRepository,
    topic: Option<&'a Topic>,
    doc_id: Option<DocId>,
    labels: Vec<String>,
    batch_size: usize,
}

impl<'a> Search<'a> {
    pub fn new(repo: &'a dyn DocRepository) -> Self {
        Search {
            repo,
            topic: None,
            doc_id: None,
            labels: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Match against this topic (OR across its expressions) in addition
    /// to any argument expression.
    pub fn with_topic(mut self, topic: &'a Topic) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Pin the search to a single document, selecting the
    /// single-document strategy.
    pub fn with_doc_id(mut self, id: DocId) -> Self {
        self.doc_id = Some(id);
        self
    }

    /// Require every one of these labels (exact strings) on the matched
    /// documents.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Stream matches for `expr` (and the configured topic) into
    /// `on_match`. Matches arrive in stream order; sorting happens after
    /// streaming, see [`collect`](Search::collect).
    pub async fn run(&self, expr: Option<&TopicExpr>, on_match: OnMatch<'_>) -> Result<()> {
        let matcher = Matcher::new(self.topic, expr);

        if let Some(doc_id) = self.doc_id {
            return self.run_single_doc(doc_id, &matcher, on_match).await;
        }
        self.run_indexed(expr, &matcher, on_match).await
    }

    /// Drain the search into a vector sorted by relevance
    /// (`num_exprs` descending, then document and sentence id).
    pub async fn collect(&self, expr: Option<&TopicExpr>) -> Result<Vec<SentenceMatch>> {
        let mut matches: Vec<SentenceMatch> = Vec::new();
        self.run(expr, &mut |m| {
            matches.push(m);
            Ok(())
        })
        .await?;
        sort_matches(&mut matches);
        Ok(matches)
    }

    async fn run_single_doc(
        &self,
        doc_id: DocId,
        matcher: &Matcher<'_>,
        on_match: OnMatch<'_>,
    ) -> Result<()> {
        let doc = self.repo.read(doc_id).await?;
        for sentence in &doc.sentences {
            if let Some(m) = matcher.match_sentence(sentence) {
                on_match(m)?;
            }
        }
        Ok(())
    }

    /// Indexed candidate retrieval: one cursor drain per positive lemma
    /// set. An argument expression contributes its own lemma set; a
    /// topic contributes one set per expression (OR semantics, so a
    /// candidate only needs to satisfy one of them). Candidates seen by
    /// an earlier drain are skipped by identity.
    async fn run_indexed(
        &self,
        expr: Option<&TopicExpr>,
        matcher: &Matcher<'_>,
        on_match: OnMatch<'_>,
    ) -> Result<()> {
        // The argument expression is the narrowest anchor: every match
        // must satisfy it, so its positive lemmas bound the candidates.
        // Without one (or when it has no positive lemma), fall back to
        // the topic's per-expression sets.
        let mut lemma_sets: Vec<Vec<String>> = Vec::new();
        if let Some(expr) = expr {
            let lemmas = expr.lemmas();
            if !lemmas.is_empty() {
                lemma_sets.push(lemmas);
            }
        }
        if lemma_sets.is_empty() {
            if let Some(topic) = self.topic {
                lemma_sets = topic.lemma_sets();
            }
        }
        if lemma_sets.is_empty() {
            return Err(SegrobError::NoLemma);
        }

        let mut seen: HashSet<(DocId, i64)> = HashSet::new();
        for lemmas in &lemma_sets {
            self.drain_candidates(lemmas, matcher, &mut seen, &mut *on_match)
                .await?;
        }
        Ok(())
    }

    async fn drain_candidates(
        &self,
        lemmas: &[String],
        matcher: &Matcher<'_>,
        seen: &mut HashSet<(DocId, i64)>,
        on_match: OnMatch<'_>,
    ) -> Result<()> {
        let mut cursor: Cursor = 0;
        loop {
            let mut batch: Vec<SentenceMatch> = Vec::new();
            let next_cursor = self
                .repo
                .find_candidates(
                    lemmas,
                    &self.labels,
                    cursor,
                    self.batch_size,
                    &mut |sentence| {
                        if !seen.insert((sentence.doc_id, sentence.id)) {
                            return Ok(());
                        }
                        if let Some(m) = matcher.match_sentence(&sentence) {
                            batch.push(m);
                        }
                        Ok(())
                    },
                )
                .await?;

            for m in batch {
                on_match(m)?;
            }

            if next_cursor == cursor {
                debug!(?lemmas, cursor, "candidate stream drained");
                return Ok(());
            }
            cursor = next_cursor;
        }
    }
}
