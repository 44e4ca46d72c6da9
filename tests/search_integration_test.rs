//! End-to-end search scenarios over the relational backend.

use tempfile::TempDir;

use segrob::storage::sqlite::{connect, create_doc_schema, SqliteDocStore};
use segrob::storage::DocRepository;
use segrob::{topic, Doc, Search, SegrobError, Sentence, Token, Topic};

fn token(index: usize, text: &str, lemma: &str, pos: &str) -> Token {
    Token {
        id: index as i64,
        index,
        idx: (index * 5) as i64,
        text: text.to_string(),
        lemma: lemma.to_string(),
        pos: pos.to_string(),
        tag: format!("{pos}__Number=Sing"),
        ..Default::default()
    }
}

/// doc A: `the cat sat on the mat`
fn doc_a() -> Doc {
    let words = [
        ("the", "the", "DET"),
        ("cat", "cat", "NOUN"),
        ("sat", "sit", "VERB"),
        ("on", "on", "ADP"),
        ("the", "the", "DET"),
        ("mat", "mat", "NOUN"),
    ];
    Doc {
        id: 0,
        title: "a.json".to_string(),
        labels: vec!["novel".to_string(), "XIX".to_string()],
        sentences: vec![Sentence {
            id: 0,
            doc_id: 0,
            tokens: words
                .iter()
                .enumerate()
                .map(|(i, (text, lemma, pos))| token(i, text, lemma, pos))
                .collect(),
        }],
    }
}

/// doc B: `a dog barks`
fn doc_b() -> Doc {
    let words = [
        ("a", "a", "DET"),
        ("dog", "dog", "NOUN"),
        ("barks", "bark", "VERB"),
    ];
    Doc {
        id: 0,
        title: "b.json".to_string(),
        labels: vec!["poetry".to_string()],
        sentences: vec![Sentence {
            id: 0,
            doc_id: 0,
            tokens: words
                .iter()
                .enumerate()
                .map(|(i, (text, lemma, pos))| token(i, text, lemma, pos))
                .collect(),
        }],
    }
}

async fn store(dir: &TempDir) -> SqliteDocStore {
    let pool = connect(&dir.path().join("docs.db")).await.unwrap();
    create_doc_schema(&pool).await.unwrap();
    let store = SqliteDocStore::new(pool);
    store.write(&doc_a()).await.unwrap();
    store.write(&doc_b()).await.unwrap();
    store
}

#[tokio::test]
async fn test_expr_near_window_hit() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    // cat..mat is 4 positions apart
    let expr = topic::parse(&["cat", "4", "mat"]).unwrap();
    let matches = Search::new(&store).collect(Some(&expr)).await.unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].num_exprs, 1);
    let chain = &matches[0].matches[0].tokens[0];
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].lemma, "cat");
    assert_eq!(chain[1].lemma, "mat");
}

#[tokio::test]
async fn test_expr_near_window_too_small() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    let expr = topic::parse(&["cat", "1", "mat"]).unwrap();
    let matches = Search::new(&store).collect(Some(&expr)).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_tag_expr_on_single_doc() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    // tag items carry no lemma, so the indexed path can not serve them;
    // the pinned-document strategy can
    let expr = topic::parse(&["VERB"]).unwrap();
    let matches = Search::new(&store)
        .with_doc_id(1)
        .collect(Some(&expr))
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    let chain = &matches[0].matches[0].tokens[0];
    assert_eq!(chain[0].lemma, "sit");
}

#[tokio::test]
async fn test_topic_or_one_match_per_doc() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    let tp = Topic {
        name: "animals".to_string(),
        exprs: vec![
            topic::parse(&["cat"]).unwrap(),
            topic::parse(&["dog"]).unwrap(),
        ],
    };
    let matches = Search::new(&store)
        .with_topic(&tp)
        .collect(None)
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| m.num_exprs == 1));
    // doc A sorts before doc B
    assert!(matches[0].sentence.doc_id < matches[1].sentence.doc_id);
}

#[tokio::test]
async fn test_negation_only_expr() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    let expr = topic::parse(&["!cat"]).unwrap();
    assert!(expr.lemmas().is_empty());

    // the indexed path has no anchor
    assert!(matches!(
        Search::new(&store).collect(Some(&expr)).await,
        Err(SegrobError::NoLemma)
    ));

    // the single-doc path agrees that a negation-only item matches
    // nothing
    let matches = Search::new(&store)
        .with_doc_id(1)
        .collect(Some(&expr))
        .await
        .unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_label_filter_conjunction() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    let expr = topic::parse(&["the"]).unwrap();
    let matches = Search::new(&store)
        .with_labels(vec!["novel".to_string(), "XIX".to_string()])
        .collect(Some(&expr))
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    let meta = store.list("").await.unwrap();
    let doc_labels = &meta
        .iter()
        .find(|m| m.id == matches[0].sentence.doc_id)
        .unwrap()
        .labels;
    assert!(doc_labels.contains(&"novel".to_string()));
    assert!(doc_labels.contains(&"XIX".to_string()));
}

#[tokio::test]
async fn test_result_order_and_scores() {
    let dir = TempDir::new().unwrap();
    let pool = connect(&dir.path().join("docs.db")).await.unwrap();
    create_doc_schema(&pool).await.unwrap();
    let store = SqliteDocStore::new(pool);

    // one doc whose second sentence matches two topic expressions
    let mut doc = doc_a();
    doc.sentences.push(Sentence {
        id: 1,
        doc_id: 0,
        tokens: vec![
            token(0, "cat", "cat", "NOUN"),
            token(1, "dog", "dog", "NOUN"),
        ],
    });
    store.write(&doc).await.unwrap();
    store.write(&doc_b()).await.unwrap();

    let tp = Topic {
        name: "animals".to_string(),
        exprs: vec![
            topic::parse(&["cat"]).unwrap(),
            topic::parse(&["dog"]).unwrap(),
        ],
    };
    let matches = Search::new(&store)
        .with_topic(&tp)
        .collect(None)
        .await
        .unwrap();

    assert_eq!(matches.len(), 3);
    // the double match leads, then (doc, sentence) ascending
    let keys: Vec<(usize, i64, i64)> = matches
        .iter()
        .map(|m| (m.num_exprs, m.sentence.doc_id, m.sentence.id))
        .collect();
    assert_eq!(keys[0].0, 2);
    assert_eq!(keys[0].2, 1);
    for pair in keys.windows(2) {
        assert!(pair[0].0 >= pair[1].0, "num_exprs must be non-increasing");
        if pair[0].0 == pair[1].0 {
            assert!(
                (pair[0].1, pair[0].2) <= (pair[1].1, pair[1].2),
                "(doc, sentence) must be non-decreasing within a score"
            );
        }
    }
}

#[tokio::test]
async fn test_cursor_drain_terminates() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    let lemmas = vec!["the".to_string()];
    let mut cursor = 0;
    let mut calls = 0;
    loop {
        let next = store
            .find_candidates(&lemmas, &[], cursor, 1, &mut |_| Ok(()))
            .await
            .unwrap();
        assert!(next >= cursor);
        calls += 1;
        assert!(calls < 50, "drain must terminate on a finite corpus");
        if next == cursor {
            break;
        }
        cursor = next;
    }
}
