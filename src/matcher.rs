//! Sentence matching: evaluate topic expressions against sentences and
//! collect the token chains that justify each match.
//!
//! The matcher is stateless per sentence: [`Matcher::match_sentence`]
//! returns zero or one [`SentenceMatch`] value and aggregation is the
//! caller's responsibility. Keying results by sentence identity used to
//! be done in a shared map inside the matcher, which collided matches of
//! sentences with equal synthetic keys; returning values closes that.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::sentence::{Sentence, Token};
use crate::topic::{Topic, TopicExpr, TopicExprItem};

/// Index used for the argument expression in [`ExprMatch::expr_index`].
pub const ARG_EXPR_INDEX: i64 = -1;

/// The chains of one matching expression.
///
/// Every chain has one token per item of its expression, in strictly
/// increasing token position. Overlapping chains are kept as distinct
/// chains; no suffix deduplication happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprMatch {
    /// Position of the expression within its topic, or
    /// [`ARG_EXPR_INDEX`] for the argument expression.
    pub expr_index: i64,

    /// One entry per chain.
    pub tokens: Vec<Vec<Token>>,
}

/// A sentence match of one or more expressions, with the sentence
/// embedded by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceMatch {
    /// Name of the matched topic; empty for pure expression searches.
    pub topic_name: String,

    /// Number of expressions that matched this sentence, the argument
    /// expression included. Used as the relevance score for sorting.
    pub num_exprs: usize,

    /// One entry per matching expression.
    pub matches: Vec<ExprMatch>,

    pub sentence: Sentence,
}

impl SentenceMatch {
    /// All matched tokens across every expression and chain. Used by the
    /// renderer for highlighting; may contain duplicates when chains
    /// overlap.
    pub fn all_tokens(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        for m in &self.matches {
            for chain in &m.tokens {
                tokens.extend(chain.iter().cloned());
            }
        }
        tokens
    }
}

/// Matches sentences against a topic and/or an argument expression.
///
/// The argument expression has AND semantics: when present, it must match
/// the sentence in addition to one or more of the topic expressions. The
/// topic expressions have OR semantics among themselves.
///
/// Borrows both for the duration of a query; a set of sentences is
/// matched by repeated [`match_sentence`](Matcher::match_sentence) calls.
pub struct Matcher<'a> {
    topic: Option<&'a Topic>,
    arg_expr: Option<&'a TopicExpr>,
}

impl<'a> Matcher<'a> {
    pub fn new(topic: Option<&'a Topic>, arg_expr: Option<&'a TopicExpr>) -> Self {
        Matcher { topic, arg_expr }
    }

    pub fn for_topic(topic: &'a Topic) -> Self {
        Matcher::new(Some(topic), None)
    }

    pub fn for_expr(expr: &'a TopicExpr) -> Self {
        Matcher::new(None, Some(expr))
    }

    /// Evaluate one sentence. Returns `None` when the sentence does not
    /// satisfy the matcher's contract:
    ///
    /// - the argument expression, if set, must match;
    /// - at least one topic expression must match when a topic is set.
    pub fn match_sentence(&self, sentence: &Sentence) -> Option<SentenceMatch> {
        let arg_chains = match self.arg_expr {
            Some(expr) if !expr.is_empty() => match match_expr(sentence, expr) {
                Some(chains) => Some(chains),
                None => return None,
            },
            _ => None,
        };

        let mut matches: Vec<ExprMatch> = Vec::new();
        let mut topic_name = String::new();
        if let Some(topic) = self.topic {
            topic_name = topic.name.clone();
            for (expr_index, expr) in topic.exprs.iter().enumerate() {
                if let Some(chains) = match_expr(sentence, expr) {
                    matches.push(ExprMatch {
                        expr_index: expr_index as i64,
                        tokens: chains,
                    });
                }
            }
            if !topic.exprs.is_empty() && matches.is_empty() {
                return None;
            }
        }

        if let Some(chains) = arg_chains {
            matches.push(ExprMatch {
                expr_index: ARG_EXPR_INDEX,
                tokens: chains,
            });
        }

        if matches.is_empty() {
            return None;
        }

        Some(SentenceMatch {
            topic_name,
            num_exprs: matches.len(),
            matches,
            sentence: sentence.clone(),
        })
    }
}

/// Evaluate one expression against one sentence as an ordered chain
/// enumeration. Returns the surviving chains, each as long as the
/// expression, or `None` when the expression does not match.
///
/// The first item is an independent scan over every token. Each
/// subsequent item extends the partial chains through its `near` window:
/// for a chain ending at token position `p`, candidates are the tokens
/// with position in `(p, min(p + near, last)]`. The window end is
/// inclusive; `near == 0` past the first item makes the window empty, so
/// such an expression can never match (a misauthored expression, not an
/// error).
pub fn match_expr(sentence: &Sentence, expr: &TopicExpr) -> Option<Vec<Vec<Token>>> {
    let (first, rest) = expr.items().split_first()?;
    let last = sentence.last_index()?;

    let mut chains: Vec<Vec<&Token>> = sentence
        .tokens
        .iter()
        .filter(|t| token_matches(t, first))
        .map(|t| vec![t])
        .collect();
    if chains.is_empty() {
        return None;
    }

    for item in rest {
        let mut extended: Vec<Vec<&Token>> = Vec::new();
        for chain in &chains {
            let p = chain.last().map(|t| t.index).unwrap_or(0);
            if p >= last {
                continue;
            }
            let end = (p + item.near).min(last);
            for token in &sentence.tokens {
                if token.index > p && token.index <= end && token_matches(token, item) {
                    let mut next = chain.clone();
                    next.push(token);
                    extended.push(next);
                }
            }
        }
        if extended.is_empty() {
            return None;
        }
        chains = extended;
    }

    Some(
        chains
            .into_iter()
            .map(|chain| chain.into_iter().cloned().collect())
            .collect(),
    )
}

/// The conjunction of the per-field predicates of an item against one
/// token. Empty fields are vacuously true, with one exception: an item
/// with no positive predicate at all (negation-only) matches no token,
/// because a negative lemma can only veto.
///
/// Tag matching uses substring containment, and `|` takes precedence
/// over `+`: a tag value containing both separators, like `A|B+C`, reads
/// as "contains `A` or contains `B+C`". The raw tag field of the
/// annotation pipeline uses `|` as its own component separator, which is
/// why containment rather than equality is used here.
pub fn token_matches(token: &Token, item: &TopicExprItem) -> bool {
    if !item.is_anchored() {
        return false;
    }

    if !item.lemma.is_empty() {
        if let Some(negated) = item.lemma.strip_prefix('!') {
            if token.lemma == negated {
                return false;
            }
        } else if !item.lemma.split('|').any(|alt| alt == token.lemma) {
            return false;
        }
    }

    if !item.tag.is_empty() {
        if item.tag.contains('|') {
            if !item.tag.split('|').any(|alt| token.tag.contains(alt)) {
                return false;
            }
        } else if item.tag.contains('+') {
            if !item.tag.split('+').all(|part| token.tag.contains(part)) {
                return false;
            }
        } else if !token.tag.contains(&item.tag) {
            return false;
        }
    }

    if !item.pos.is_empty() && item.pos != token.pos {
        return false;
    }

    true
}

/// Sort aggregated matches for presentation: `num_exprs` descending
/// (topic relevance first), then document id and sentence id ascending.
pub fn sort_matches(matches: &mut [SentenceMatch]) {
    matches.sort_by(compare_matches);
}

/// Comparison used by [`sort_matches`], exposed for callers that merge
/// already sorted streams.
pub fn compare_matches(a: &SentenceMatch, b: &SentenceMatch) -> Ordering {
    b.num_exprs
        .cmp(&a.num_exprs)
        .then_with(|| a.sentence.doc_id.cmp(&b.sentence.doc_id))
        .then_with(|| a.sentence.id.cmp(&b.sentence.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic;

    /// `the cat sat on the mat`, with lemmas equal to the surface forms.
    fn cat_sentence() -> Sentence {
        sentence_from(&[
            ("the", "DET"),
            ("cat", "NOUN"),
            ("sat", "VERB"),
            ("on", "ADP"),
            ("the", "DET"),
            ("mat", "NOUN"),
        ])
    }

    fn sentence_from(words: &[(&str, &str)]) -> Sentence {
        let tokens = words
            .iter()
            .enumerate()
            .map(|(i, (word, pos))| Token {
                id: i as i64,
                index: i,
                idx: (i * 6) as i64,
                text: word.to_string(),
                lemma: word.to_string(),
                pos: pos.to_string(),
                tag: format!("{pos}__Number=Sing"),
                ..Default::default()
            })
            .collect();
        Sentence {
            id: 0,
            doc_id: 0,
            tokens,
        }
    }

    fn expr(fields: &[&str]) -> TopicExpr {
        topic::parse(fields).unwrap()
    }

    fn chain_lemmas(chains: &[Vec<Token>]) -> Vec<Vec<String>> {
        chains
            .iter()
            .map(|c| c.iter().map(|t| t.lemma.clone()).collect())
            .collect()
    }

    #[test]
    fn test_near_window_match() {
        // cat is at position 1, mat at 5: distance 4. near 4 reaches it,
        // near 3 falls one short.
        let s = cat_sentence();
        assert!(match_expr(&s, &expr(&["cat", "4", "mat"])).is_some());
        assert!(match_expr(&s, &expr(&["cat", "3", "mat"])).is_none());
    }

    #[test]
    fn test_near_window_is_closed() {
        // Every returned chain [a, b] satisfies 0 < b.index - a.index <= k.
        let s = cat_sentence();
        for k in 1..=5usize {
            let e = expr(&["the", &k.to_string(), "mat"]);
            if let Some(chains) = match_expr(&s, &e) {
                for chain in &chains {
                    let d = chain[1].index - chain[0].index;
                    assert!(d > 0 && d <= k, "near {k} produced distance {d}");
                }
            }
        }
    }

    #[test]
    fn test_single_item_one_chain_per_token() {
        let s = cat_sentence();
        let chains = match_expr(&s, &expr(&["the"])).unwrap();
        assert_eq!(
            chain_lemmas(&chains),
            vec![vec!["the".to_string()], vec!["the".to_string()]]
        );
    }

    #[test]
    fn test_overlapping_chains_kept() {
        // Both `the` tokens reach `mat` within 5; the chains share the
        // suffix and both survive.
        let s = cat_sentence();
        let chains = match_expr(&s, &expr(&["the", "5", "mat"])).unwrap();
        assert_eq!(chains.len(), 2);
    }

    #[test]
    fn test_tag_item_substring() {
        // `VERB` starts uppercase, so it classifies as a tag item and
        // matches `sat` by substring containment against
        // `VERB__Number=Sing`.
        let s = cat_sentence();
        let chains = match_expr(&s, &expr(&["VERB"])).unwrap();
        assert_eq!(chain_lemmas(&chains), vec![vec!["sat".to_string()]]);
    }

    #[test]
    fn test_near_zero_beyond_first_never_matches() {
        let s = cat_sentence();
        let e = TopicExpr(vec![
            expr(&["cat"]).items()[0].clone(),
            expr(&["sat"]).items()[0].clone(),
        ]);
        // near stays 0 on the second item: empty window.
        assert!(match_expr(&s, &e).is_none());
    }

    #[test]
    fn test_near_on_first_item_ignored() {
        let mut e = expr(&["cat"]);
        e.0[0].near = 3;
        assert!(match_expr(&cat_sentence(), &e).is_some());
    }

    #[test]
    fn test_chain_from_last_token_dropped() {
        // `mat` is the final token; nothing can follow it.
        let s = cat_sentence();
        assert!(match_expr(&s, &expr(&["mat", "3", "the"])).is_none());
    }

    #[test]
    fn test_lemma_or_alternatives() {
        let s = cat_sentence();
        let chains = match_expr(&s, &expr(&["cat|dog"])).unwrap();
        assert_eq!(chain_lemmas(&chains), vec![vec!["cat".to_string()]]);
    }

    #[test]
    fn test_negation_only_item_matches_nothing() {
        // A negative lemma can only veto; an item without a positive
        // predicate never affirms a token, on any path.
        let s = cat_sentence();
        assert!(match_expr(&s, &expr(&["!cat"])).is_none());
        assert!(match_expr(&s, &expr(&["!missing"])).is_none());
    }

    #[test]
    fn test_negation_vetoes_anchored_item() {
        let s = cat_sentence();
        let item = TopicExprItem {
            lemma: "!cat".to_string(),
            pos: "NOUN".to_string(),
            ..Default::default()
        };
        let chains = match_expr(&s, &TopicExpr(vec![item])).unwrap();
        // pos NOUN anchors the item; the negation removes `cat`, leaving
        // `mat`.
        assert_eq!(chain_lemmas(&chains), vec![vec!["mat".to_string()]]);
    }

    #[test]
    fn test_tag_and_of_substrings() {
        let s = cat_sentence();
        let item = TopicExprItem {
            tag: "VERB+Number=Sing".to_string(),
            ..Default::default()
        };
        let chains = match_expr(&s, &TopicExpr(vec![item])).unwrap();
        assert_eq!(chain_lemmas(&chains), vec![vec!["sat".to_string()]]);

        let item = TopicExprItem {
            tag: "VERB+Number=Plur".to_string(),
            ..Default::default()
        };
        assert!(match_expr(&s, &TopicExpr(vec![item])).is_none());
    }

    #[test]
    fn test_tag_or_takes_precedence_over_and() {
        // `A|B+C` reads "contains A or contains B+C": the `+` on the
        // right side is matched literally as part of the substring.
        let mut s = cat_sentence();
        s.tokens[0].tag = "A".to_string();
        s.tokens[1].tag = "B+C".to_string();
        s.tokens[2].tag = "B".to_string();
        let item = TopicExprItem {
            tag: "A|B+C".to_string(),
            ..Default::default()
        };
        let e = TopicExpr(vec![item]);
        let chains = match_expr(&s, &e).unwrap();
        // token 0 contains "A", token 1 contains "B+C"; token 2 contains
        // neither alternative. "mat" etc. carry no A.
        let matched: Vec<usize> = chains.iter().map(|c| c[0].index).collect();
        assert_eq!(matched, vec![0, 1]);
    }

    #[test]
    fn test_pos_exact_match() {
        let item = TopicExprItem {
            pos: "NOUN".to_string(),
            ..Default::default()
        };
        let chains = match_expr(&cat_sentence(), &TopicExpr(vec![item])).unwrap();
        assert_eq!(
            chain_lemmas(&chains),
            vec![vec!["cat".to_string()], vec!["mat".to_string()]]
        );
    }

    #[test]
    fn test_match_sentence_expr_only() {
        let e = expr(&["cat", "4", "mat"]);
        let matcher = Matcher::for_expr(&e);
        let m = matcher.match_sentence(&cat_sentence()).unwrap();
        assert_eq!(m.num_exprs, 1);
        assert_eq!(m.matches.len(), 1);
        assert_eq!(m.matches[0].expr_index, ARG_EXPR_INDEX);
        assert_eq!(
            chain_lemmas(&m.matches[0].tokens),
            vec![vec!["cat".to_string(), "mat".to_string()]]
        );
        assert!(m.topic_name.is_empty());
    }

    #[test]
    fn test_match_sentence_topic_or() {
        let topic = Topic {
            name: "animals".to_string(),
            exprs: vec![expr(&["cat"]), expr(&["dog"]), expr(&["mat"])],
        };
        let matcher = Matcher::for_topic(&topic);
        let m = matcher.match_sentence(&cat_sentence()).unwrap();
        // cat and mat match, dog does not.
        assert_eq!(m.num_exprs, 2);
        let indexes: Vec<i64> = m.matches.iter().map(|em| em.expr_index).collect();
        assert_eq!(indexes, vec![0, 2]);
        assert_eq!(m.topic_name, "animals");
    }

    #[test]
    fn test_match_sentence_topic_no_match() {
        let topic = Topic {
            name: "animals".to_string(),
            exprs: vec![expr(&["dog"])],
        };
        assert!(Matcher::for_topic(&topic)
            .match_sentence(&cat_sentence())
            .is_none());
    }

    #[test]
    fn test_match_sentence_arg_expr_gates_topic() {
        let topic = Topic {
            name: "animals".to_string(),
            exprs: vec![expr(&["cat"])],
        };
        let missing = expr(&["dog"]);
        let matcher = Matcher::new(Some(&topic), Some(&missing));
        assert!(matcher.match_sentence(&cat_sentence()).is_none());

        let present = expr(&["mat"]);
        let matcher = Matcher::new(Some(&topic), Some(&present));
        let m = matcher.match_sentence(&cat_sentence()).unwrap();
        // one topic expression plus the argument expression.
        assert_eq!(m.num_exprs, 2);
        assert_eq!(m.matches.last().unwrap().expr_index, ARG_EXPR_INDEX);
    }

    #[test]
    fn test_match_sentence_empty_sentence() {
        let e = expr(&["cat"]);
        let empty = Sentence::default();
        assert!(Matcher::for_expr(&e).match_sentence(&empty).is_none());
    }

    #[test]
    fn test_sort_matches_order() {
        let make = |num_exprs: usize, doc_id: i64, sent_id: i64| SentenceMatch {
            topic_name: String::new(),
            num_exprs,
            matches: vec![],
            sentence: Sentence {
                id: sent_id,
                doc_id,
                tokens: vec![],
            },
        };
        let mut matches = vec![make(1, 2, 0), make(2, 5, 3), make(1, 0, 7), make(1, 0, 2)];
        sort_matches(&mut matches);
        let keys: Vec<(usize, i64, i64)> = matches
            .iter()
            .map(|m| (m.num_exprs, m.sentence.doc_id, m.sentence.id))
            .collect();
        assert_eq!(keys, vec![(2, 5, 3), (1, 0, 2), (1, 0, 7), (1, 2, 0)]);
    }

    #[test]
    fn test_all_tokens_flattens_chains() {
        let e = expr(&["the", "5", "mat"]);
        let m = Matcher::for_expr(&e)
            .match_sentence(&cat_sentence())
            .unwrap();
        let lemmas: Vec<String> = m.all_tokens().into_iter().map(|t| t.lemma).collect();
        assert_eq!(lemmas, vec!["the", "mat", "the", "mat"]);
    }
}
