//! Topic expression language: AST, positional parser, stringification.
//!
//! A topic is a named, ordered collection of expressions with OR
//! semantics: a sentence matches the topic when any expression matches.
//! An expression is an ordered sequence of items; items after the first
//! are positional and chain to their predecessor through a `near` window
//! (see the matcher).
//!
//! # Input syntax
//!
//! Expressions are written as space separated fields:
//!
//! - an integer field sets the `near` distance of the *following* item;
//! - a field starting with an uppercase letter is a `tag` item
//!   (substring match against the fine-grained tag);
//! - anything else, `!`-negations included, is a `lemma` item.
//!
//! `tomar 2 mano` therefore reads: lemma `tomar`, then lemma `mano`
//! within two positions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A predicate over a single token, plus an optional `near` distance
/// constraint that only has meaning for items at position >= 1 of their
/// expression.
///
/// The identity fields (`topic_name`, `expr_index`, `item_index`) are
/// derivable and never persisted; repositories backfill them on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicExprItem {
    #[serde(skip)]
    pub topic_name: String,

    #[serde(skip)]
    pub expr_index: usize,

    #[serde(skip)]
    pub item_index: usize,

    /// Window size in token positions back to the previous chain token.
    #[serde(default, skip_serializing_if = "near_is_zero")]
    pub near: usize,

    /// A value, `v1|v2|...` (OR over values) or `!v` (negation).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lemma: String,

    /// Exact match against the coarse POS.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pos: String,

    /// Dependency label. Stored and compared for equality, but not
    /// matched against tokens.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dep: String,

    /// Substring, `s1|s2|...` (OR of substrings) or `s1+s2+...` (AND of
    /// substrings) against the token's raw tag field.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
}

fn near_is_zero(near: &usize) -> bool {
    *near == 0
}

impl TopicExprItem {
    /// True when the item has at least one predicate that can affirm a
    /// token: a positive lemma, a tag or a pos. An item whose only
    /// predicate is a negative lemma can veto but never affirm, so it
    /// matches no token at all.
    pub fn is_anchored(&self) -> bool {
        (!self.lemma.is_empty() && !self.lemma.starts_with('!'))
            || !self.tag.is_empty()
            || !self.pos.is_empty()
    }
}

/// Item equality is field-wise over the predicate fields only; the
/// derived identity fields do not participate.
impl PartialEq for TopicExprItem {
    fn eq(&self, other: &Self) -> bool {
        self.lemma == other.lemma
            && self.near == other.near
            && self.tag == other.tag
            && self.pos == other.pos
            && self.dep == other.dep
    }
}

impl Eq for TopicExprItem {}

/// An ordered sequence of items with positional AND semantics.
///
/// Equality is order-sensitive: `[a, b] != [b, a]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicExpr(pub Vec<TopicExprItem>);

impl TopicExpr {
    pub fn items(&self) -> &[TopicExprItem] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The ordered unique positive lemma surfaces of the expression.
    ///
    /// Negative lemmas (`!x`) are excluded: they never enter the inverted
    /// index and are handled by the matcher only. Surfaces are returned
    /// verbatim, so an OR lemma like `cat|dog` becomes a single index key
    /// that matches no row of the lemma index; such expressions can not
    /// be served by indexed retrieval.
    pub fn lemmas(&self) -> Vec<String> {
        let mut lemmas: Vec<String> = Vec::new();
        for item in &self.0 {
            if item.lemma.is_empty() || item.lemma.starts_with('!') {
                continue;
            }
            if !lemmas.iter().any(|l| l == &item.lemma) {
                lemmas.push(item.lemma.clone());
            }
        }
        lemmas
    }
}

/// Stringification is the parser's inverse: `near` precedes its item when
/// non-zero, and when both lemma and tag are set on one item the lemma
/// wins. Parsing the printed form yields an equal expression for
/// syntactically normal inputs.
impl fmt::Display for TopicExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<String> = Vec::new();
        for item in &self.0 {
            if item.near > 0 {
                fields.push(item.near.to_string());
            }
            if !item.lemma.is_empty() {
                fields.push(item.lemma.clone());
                continue;
            }
            if !item.tag.is_empty() {
                fields.push(item.tag.clone());
            }
        }
        write!(f, "{}", fields.join(" "))
    }
}

/// Parse an ordered sequence of lexical fields into an expression.
///
/// Integer fields become the `near` of the following item, never an item
/// themselves. An integer in first position or two integers in a row are
/// grammar violations.
pub fn parse<S: AsRef<str>>(fields: &[S]) -> Result<TopicExpr, ParseError> {
    let mut items: Vec<TopicExprItem> = Vec::new();
    let mut pending_near: usize = 0;
    let mut last_was_int = false;

    for (idx, field) in fields.iter().enumerate() {
        let field = field.as_ref();
        if let Ok(near) = field.parse::<usize>() {
            if idx == 0 {
                return Err(ParseError::LeadingInteger);
            }
            if last_was_int {
                return Err(ParseError::ConsecutiveIntegers);
            }
            pending_near = near;
            last_was_int = true;
            continue;
        }

        let is_tag = field
            .chars()
            .next()
            .map(|c| c.is_uppercase() && c.is_alphabetic())
            .unwrap_or(false);

        let mut item = TopicExprItem {
            near: pending_near,
            ..Default::default()
        };
        if is_tag {
            item.tag = field.to_string();
        } else {
            item.lemma = field.to_string();
        }
        items.push(item);

        pending_near = 0;
        last_was_int = false;
    }

    Ok(TopicExpr(items))
}

/// A named, ordered collection of expressions with OR semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topic {
    pub name: String,
    pub exprs: Vec<TopicExpr>,
}

impl Topic {
    /// One positive lemma set per expression, empty sets dropped. These
    /// sets drive indexed candidate retrieval: a candidate sentence must
    /// contain every lemma of at least one set.
    pub fn lemma_sets(&self) -> Vec<Vec<String>> {
        self.exprs
            .iter()
            .map(|e| e.lemmas())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// True if an equal expression (order-sensitive) is already present.
    pub fn contains_expr(&self, expr: &TopicExpr) -> bool {
        self.exprs.iter().any(|e| e == expr)
    }

    /// Remove the first expression equal to `expr`, if any.
    pub fn remove_expr(&mut self, expr: &TopicExpr) -> bool {
        match self.exprs.iter().position(|e| e == expr) {
            Some(idx) => {
                self.exprs.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Backfill the derived identity fields of every item.
    pub fn stamp_items(&mut self) {
        for (expr_index, expr) in self.exprs.iter_mut().enumerate() {
            for (item_index, item) in expr.0.iter_mut().enumerate() {
                item.topic_name = self.name.clone();
                item.expr_index = expr_index;
                item.item_index = item_index;
            }
        }
    }
}

/// A collection of topics, as returned by
/// [`TopicRepository::read_all`](crate::storage::TopicRepository::read_all).
#[derive(Debug, Clone, Default)]
pub struct Library(pub Vec<Topic>);

impl Library {
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&Topic> {
        self.0.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Topic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemma_item(lemma: &str, near: usize) -> TopicExprItem {
        TopicExprItem {
            lemma: lemma.to_string(),
            near,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_lemma_and_near() {
        let expr = parse(&["tomar", "2", "mano"]).unwrap();
        assert_eq!(expr.len(), 2);
        assert_eq!(expr.items()[0].lemma, "tomar");
        assert_eq!(expr.items()[0].near, 0);
        assert_eq!(expr.items()[1].lemma, "mano");
        assert_eq!(expr.items()[1].near, 2);
    }

    #[test]
    fn test_parse_uppercase_is_tag() {
        let expr = parse(&["Verb", "3", "cuando"]).unwrap();
        assert_eq!(expr.items()[0].tag, "Verb");
        assert!(expr.items()[0].lemma.is_empty());
        assert_eq!(expr.items()[1].lemma, "cuando");
        assert_eq!(expr.items()[1].near, 3);
    }

    #[test]
    fn test_parse_negation_is_lemma() {
        let expr = parse(&["cat", "1", "!mat"]).unwrap();
        assert_eq!(expr.items()[1].lemma, "!mat");
        assert!(expr.items()[1].tag.is_empty());
    }

    #[test]
    fn test_parse_leading_integer() {
        assert_eq!(parse(&["3", "Noun"]), Err(ParseError::LeadingInteger));
    }

    #[test]
    fn test_parse_consecutive_integers() {
        assert_eq!(
            parse(&["cat", "1", "2", "mat"]),
            Err(ParseError::ConsecutiveIntegers)
        );
    }

    #[test]
    fn test_parse_display_round_trip() {
        for input in [
            vec!["cat"],
            vec!["cat", "3", "mat"],
            vec!["Verb", "1", "cuando", "2", "Noun"],
            vec!["!cat", "5", "a|b|c"],
        ] {
            let expr = parse(&input).unwrap();
            let printed = expr.to_string();
            assert_eq!(printed, input.join(" "));
            let reparsed = parse(&printed.split(' ').collect::<Vec<_>>()).unwrap();
            assert_eq!(reparsed, expr);
        }
    }

    #[test]
    fn test_display_lemma_wins_over_tag() {
        let expr = TopicExpr(vec![
            lemma_item("tomar", 0),
            TopicExprItem {
                near: 2,
                lemma: "mano".to_string(),
                tag: "NOUN".to_string(),
                ..Default::default()
            },
        ]);
        assert_eq!(expr.to_string(), "tomar 2 mano");
    }

    #[test]
    fn test_lemmas_skips_negatives_and_dedups() {
        let expr = parse(&["cat", "1", "!dog", "2", "cat", "1", "mat"]).unwrap();
        assert_eq!(expr.lemmas(), vec!["cat", "mat"]);
    }

    #[test]
    fn test_lemmas_keeps_or_surface_verbatim() {
        let expr = parse(&["cat|dog"]).unwrap();
        assert_eq!(expr.lemmas(), vec!["cat|dog"]);
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let ab = TopicExpr(vec![lemma_item("a", 0), lemma_item("b", 1)]);
        let ba = TopicExpr(vec![lemma_item("b", 0), lemma_item("a", 1)]);
        assert_ne!(ab, ba);
        assert_eq!(ab, ab.clone());
    }

    #[test]
    fn test_equality_ignores_identity_fields() {
        let mut a = lemma_item("a", 0);
        let b = lemma_item("a", 0);
        a.topic_name = "tp".to_string();
        a.expr_index = 3;
        a.item_index = 1;
        assert_eq!(a, b);
    }

    #[test]
    fn test_item_serde_skips_empty_and_identity() {
        let item = TopicExprItem {
            topic_name: "tp".to_string(),
            expr_index: 1,
            item_index: 2,
            near: 3,
            lemma: "mano".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, serde_json::json!({"near": 3, "lemma": "mano"}));

        let back: TopicExprItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
        assert!(back.topic_name.is_empty());
    }

    #[test]
    fn test_lemma_sets_drops_empty() {
        let topic = Topic {
            name: "t".to_string(),
            exprs: vec![
                parse(&["cat"]).unwrap(),
                parse(&["!dog"]).unwrap(),
                parse(&["dog", "2", "Noun"]).unwrap(),
            ],
        };
        assert_eq!(topic.lemma_sets(), vec![vec!["cat"], vec!["dog"]]);
    }

    #[test]
    fn test_is_anchored() {
        assert!(parse(&["cat"]).unwrap().items()[0].is_anchored());
        assert!(parse(&["Verb"]).unwrap().items()[0].is_anchored());
        assert!(!parse(&["!cat"]).unwrap().items()[0].is_anchored());
        let pos_only = TopicExprItem {
            pos: "NOUN".to_string(),
            ..Default::default()
        };
        assert!(pos_only.is_anchored());
    }

    #[test]
    fn test_topic_remove_expr() {
        let mut topic = Topic {
            name: "t".to_string(),
            exprs: vec![parse(&["cat"]).unwrap(), parse(&["dog"]).unwrap()],
        };
        let dog = parse(&["dog"]).unwrap();
        assert!(topic.contains_expr(&dog));
        assert!(topic.remove_expr(&dog));
        assert!(!topic.contains_expr(&dog));
        assert!(!topic.remove_expr(&dog));
        assert_eq!(topic.exprs.len(), 1);
    }

    #[test]
    fn test_stamp_items() {
        let mut topic = Topic {
            name: "greetings".to_string(),
            exprs: vec![parse(&["hola", "2", "decir"]).unwrap()],
        };
        topic.stamp_items();
        let item = &topic.exprs[0].items()[1];
        assert_eq!(item.topic_name, "greetings");
        assert_eq!(item.expr_index, 0);
        assert_eq!(item.item_index, 1);
    }
}
