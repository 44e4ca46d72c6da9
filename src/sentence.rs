//! Canonical data model: tokens, sentences, documents.
//!
//! Tokens arrive pre-annotated from an external NLP pipeline (spacy,
//! stanza). The field names of the JSON serialization are fixed by the
//! existing corpora and must be accepted verbatim.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegrobError};

/// Stable document identifier within a repository.
pub type DocId = i64;

/// A single pre-analyzed word with surface text, lemma, POS and
/// positional metadata. Immutable once ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: i64,

    /// Index of the syntactic head of this token.
    pub head: i64,

    /// Id of the sentence this token belongs to, as stamped by the
    /// annotation pipeline.
    #[serde(rename = "sent")]
    pub sentence_id: i64,

    /// Coarse part-of-speech tag (`NOUN`, `VERB`, ...).
    pub pos: String,

    /// Dependency label.
    pub dep: String,

    /// Fine-grained tag string, `|`-joined key=value components, e.g.
    /// `DET__Definite=Def|Gender=Fem|Number=Sing|PronType=Art`.
    pub tag: String,

    /// Character offset of the token in the original document. Opaque to
    /// the matcher; only the renderer uses it to reconstruct spacing.
    pub idx: i64,

    /// The unmodified surface form.
    pub text: String,

    /// The canonical form of the word, the primary index key.
    pub lemma: String,

    /// 0-based position of the token inside its sentence.
    pub index: usize,
}

/// An ordered sequence of tokens. Identity is `(doc_id, id)` and must be
/// preserved across all retrieval paths; losing it makes matches of
/// different sentences collide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// 0-based position of the sentence inside its document.
    pub id: i64,

    #[serde(default)]
    pub doc_id: DocId,

    pub tokens: Vec<Token>,
}

impl Sentence {
    /// Position of the last token, by the token `index` field.
    pub fn last_index(&self) -> Option<usize> {
        self.tokens.last().map(|t| t.index)
    }
}

/// A labeled, ordered collection of sentences.
///
/// `id` and `title` are repository metadata: the filesystem backend
/// derives them from the directory listing, the relational backend from
/// the `docs` table. Neither is part of the JSON document body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Doc {
    #[serde(skip)]
    pub id: DocId,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

impl Doc {
    /// Borrow the sentence with the given 0-based id.
    pub fn sentence(&self, id: i64) -> Result<&Sentence> {
        if id < 0 || id as usize >= self.sentences.len() {
            return Err(SegrobError::OutOfRange {
                what: "sentence",
                id,
                max: self.sentences.len() as i64 - 1,
            });
        }
        Ok(&self.sentences[id as usize])
    }
}

/// Metadata-only view of a document, as returned by
/// [`DocRepository::list`](crate::storage::DocRepository::list).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocMeta {
    pub id: DocId,
    pub title: String,
    pub labels: Vec<String>,
}

/// True if any label contains `substr`. An empty `substr` matches
/// everything (discovery mode).
pub fn labels_contain(labels: &[String], substr: &str) -> bool {
    if substr.is_empty() {
        return true;
    }
    labels.iter().any(|l| l.contains(substr))
}

/// True if `labels` contains every one of `required` as an exact string.
pub fn has_all_labels(labels: &[String], required: &[String]) -> bool {
    required.iter().all(|r| labels.iter().any(|l| l == r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_json_field_names() {
        let json = r#"{
            "id": 455,
            "pos": "VERB",
            "tag": "VerbForm=Inf",
            "dep": "xcomp",
            "head": 3,
            "text": "envolverse",
            "sent": 0,
            "idx": 2431,
            "index": 4,
            "lemma": "envolver"
        }"#;
        let token: Token = serde_json::from_str(json).unwrap();
        assert_eq!(token.sentence_id, 0);
        assert_eq!(token.lemma, "envolver");
        assert_eq!(token.index, 4);
        assert_eq!(token.idx, 2431);

        // The canonical key for sentence_id stays "sent" on the way out.
        let out = serde_json::to_value(&token).unwrap();
        assert_eq!(out["sent"], 0);
        assert!(out.get("sentence_id").is_none());
    }

    #[test]
    fn test_doc_id_not_persisted() {
        let doc = Doc {
            id: 7,
            title: "a.json".to_string(),
            labels: vec!["novel".to_string()],
            sentences: vec![],
        };
        let out = serde_json::to_value(&doc).unwrap();
        assert!(out.get("id").is_none());
        assert_eq!(out["title"], "a.json");
    }

    #[test]
    fn test_sentence_doc_id_defaults() {
        let json = r#"{"id": 3, "tokens": []}"#;
        let s: Sentence = serde_json::from_str(json).unwrap();
        assert_eq!(s.doc_id, 0);
        assert_eq!(s.id, 3);
    }

    #[test]
    fn test_doc_sentence_out_of_range() {
        let doc = Doc {
            sentences: vec![Sentence::default()],
            ..Default::default()
        };
        assert!(doc.sentence(0).is_ok());
        assert!(matches!(
            doc.sentence(1),
            Err(SegrobError::OutOfRange { .. })
        ));
        assert!(matches!(
            doc.sentence(-1),
            Err(SegrobError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_label_helpers() {
        let labels = vec!["novel".to_string(), "XIX".to_string()];
        assert!(labels_contain(&labels, "nov"));
        assert!(labels_contain(&labels, ""));
        assert!(!labels_contain(&labels, "poetry"));

        assert!(has_all_labels(&labels, &["novel".to_string()]));
        assert!(!has_all_labels(&labels, &["nov".to_string()]));
        assert!(has_all_labels(&labels, &[]));
    }
}
