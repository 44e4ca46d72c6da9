//! Terminal rendering of sentences, matches and topics.
//!
//! Sentences are reconstructed from the token `idx` offsets (the
//! character offsets stamped by the annotation pipeline), which restores
//! the original spacing and collapses multi-part tokens that share one
//! offset. Output goes to a caller supplied writer so commands and tests
//! can inject buffers.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use colored::Colorize;

use crate::error::Result;
use crate::matcher::SentenceMatch;
use crate::sentence::{DocId, Token};
use crate::topic::TopicExpr;

/// Tokens shown on each side of the outermost matched tokens in `part`
/// format.
const PARTIAL_OFFSET: usize = 6;

/// Sentence output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// The whole sentence.
    #[default]
    All,
    /// Only the surroundings of the matched tokens.
    Part,
    /// Only the matched lemmas.
    Lemma,
    /// Aggregated matched lemma phrases with counts.
    Aggr,
    /// The raw matches as a JSON array, for machine consumption.
    Json,
}

impl Format {
    pub fn supported() -> [Format; 5] {
        [
            Format::All,
            Format::Part,
            Format::Lemma,
            Format::Aggr,
            Format::Json,
        ]
    }

    /// The next format in [`supported`](Format::supported) order,
    /// wrapping around. Used by the REPL format toggle.
    pub fn next(self) -> Format {
        let supported = Format::supported();
        let pos = supported.iter().position(|f| *f == self).unwrap_or(0);
        supported[(pos + 1) % supported.len()]
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::All => "all",
            Format::Part => "part",
            Format::Lemma => "lemma",
            Format::Aggr => "aggr",
            Format::Json => "json",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Format::All),
            "part" => Ok(Format::Part),
            "lemma" => Ok(Format::Lemma),
            "aggr" => Ok(Format::Aggr),
            "json" => Ok(Format::Json),
            other => {
                Err(format!("allowed values are all, part, lemma, aggr, json (got {other})"))
            }
        }
    }
}

/// Renders matched sentences to a terminal.
pub struct Renderer {
    pub has_color: bool,
    pub has_prefix: bool,
    pub format: Format,
    /// Only show sentences matched by at least this many expressions.
    pub num_matches: usize,
    doc_prefix: bool,
    topic_prefix: bool,
    doc_names: HashMap<DocId, String>,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            has_color: true,
            has_prefix: true,
            format: Format::All,
            num_matches: 0,
            doc_prefix: true,
            topic_prefix: true,
            doc_names: HashMap::new(),
        }
    }

    /// Enable or disable the `[title doc sent:score]` prefix.
    pub fn with_doc_prefix(mut self, on: bool) -> Self {
        self.doc_prefix = on;
        self
    }

    /// Enable or disable the topic name prefix.
    pub fn with_topic_prefix(mut self, on: bool) -> Self {
        self.topic_prefix = on;
        self
    }

    /// Register a document title for prefix rendering.
    pub fn add_doc_name(&mut self, id: DocId, title: &str) {
        self.doc_names.insert(id, title.to_string());
    }

    pub fn toggle_prefix(&mut self) {
        self.has_prefix = !self.has_prefix;
    }

    /// Render sorted matches in the configured format. Stops at the
    /// first match below the `num_matches` threshold (input is sorted by
    /// relevance, so everything after it is below too).
    pub fn render_matches(&self, matches: &[SentenceMatch], out: &mut dyn Write) -> Result<()> {
        if self.format == Format::Json {
            let end = matches
                .iter()
                .position(|m| self.num_matches > 0 && m.num_exprs < self.num_matches)
                .unwrap_or(matches.len());
            writeln!(out, "{}", to_json(&matches[..end])?)?;
            return Ok(());
        }

        let mut aggregated: HashMap<String, usize> = HashMap::new();

        for m in matches {
            if self.num_matches > 0 && m.num_exprs < self.num_matches {
                break;
            }

            let matched = m.all_tokens();
            let text = match self.format {
                Format::All => self.sentence_text(&m.sentence.tokens, &matched),
                Format::Part => self.part_text(&m.sentence.tokens, &matched),
                Format::Lemma => lemma_text(&matched),
                Format::Aggr => {
                    aggregate_lemmas(&matched, &mut aggregated);
                    continue;
                }
                // already written as one array before the loop
                Format::Json => break,
            };

            let prefix = format!("{}{}", self.doc_prefix_text(m), self.topic_prefix_text(m));
            writeln!(out, "{prefix}{}", text.replace('\n', " "))?;
        }

        if self.format == Format::Aggr {
            self.render_aggregated(&aggregated, out)?;
        }
        Ok(())
    }

    /// Render a single sentence with an arbitrary prefix and no
    /// highlighting.
    pub fn render_sentence(
        &self,
        tokens: &[Token],
        prefix: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        let text = self.sentence_text(tokens, &[]);
        writeln!(out, "{prefix}{}", text.replace('\n', " "))?;
        Ok(())
    }

    /// Print topic expressions in a form the expression parser accepts:
    /// `near` before its item, lemma preferred over tag, tags quoted.
    pub fn render_topic(&self, exprs: &[TopicExpr], out: &mut dyn Write) -> Result<()> {
        for expr in exprs {
            let mut fields: Vec<String> = Vec::new();
            for item in expr.items() {
                if item.near > 0 {
                    fields.push(item.near.to_string());
                }
                if !item.lemma.is_empty() {
                    fields.push(item.lemma.clone());
                    continue;
                }
                if !item.tag.is_empty() {
                    fields.push(format!("{:?}", item.tag));
                }
            }
            writeln!(out, "{}", fields.join(" "))?;
        }
        Ok(())
    }

    /// Reconstruct the sentence text from token offsets, highlighting
    /// the matched tokens. Consecutive tokens sharing one `idx` are the
    /// parts of a multi-part word and render once.
    fn sentence_text(&self, tokens: &[Token], matched: &[Token]) -> String {
        let mut text = String::new();
        let mut last_idx: i64 = 0;
        let mut last_len: usize = 0;
        let mut first = true;

        for token in tokens {
            let len = token.text.chars().count();
            if first {
                text.push_str(&self.color_token(token, matched));
                last_idx = token.idx;
                last_len = len;
                first = false;
                continue;
            }

            let diff = token.idx - last_idx;
            if diff > 0 {
                let gap = (diff as usize).saturating_sub(last_len);
                text.push_str(&" ".repeat(gap));
                text.push_str(&self.color_token(token, matched));
            }
            // diff == 0: second part of a multi-part word, already rendered

            last_idx = token.idx;
            last_len = len;
        }

        text
    }

    /// The sub-sentence around the matched tokens, PARTIAL_OFFSET tokens
    /// to each side. Without matches the whole sentence renders.
    fn part_text(&self, tokens: &[Token], matched: &[Token]) -> String {
        if matched.is_empty() {
            return self.sentence_text(tokens, matched);
        }

        let first_match = matched.iter().map(|t| t.index).min().unwrap_or(0);
        let last_match = matched.iter().map(|t| t.index).max().unwrap_or(0);
        let last_token = tokens.len().saturating_sub(1);

        let start = first_match.saturating_sub(PARTIAL_OFFSET);
        let end = if last_token - last_match > PARTIAL_OFFSET {
            last_match + PARTIAL_OFFSET
        } else {
            last_token
        };

        self.sentence_text(&tokens[start..=end.min(last_token)], matched)
    }

    fn color_token(&self, token: &Token, matched: &[Token]) -> String {
        if self.has_color && matched.iter().any(|m| m.id == token.id) {
            token.text.green().bold().to_string()
        } else {
            token.text.clone()
        }
    }

    fn doc_prefix_text(&self, m: &SentenceMatch) -> String {
        if !self.has_prefix || !self.doc_prefix {
            return String::new();
        }
        let title = self
            .doc_names
            .get(&m.sentence.doc_id)
            .map(String::as_str)
            .unwrap_or("");
        let short: String = title.chars().take(20).collect();
        let padded = format!("{short:<20}");
        let painted = if self.has_color {
            padded.bright_black().to_string()
        } else {
            padded
        };
        format!(
            "[{painted} {:2} {:5}:{:2}] ✍  ",
            m.sentence.doc_id, m.sentence.id, m.num_exprs
        )
    }

    fn topic_prefix_text(&self, m: &SentenceMatch) -> String {
        if !self.has_prefix || !self.topic_prefix || m.topic_name.is_empty() {
            return String::new();
        }
        let name = if self.has_color {
            m.topic_name.yellow().to_string()
        } else {
            m.topic_name.clone()
        };
        format!("[🏷  {name:<40}] ✍  ")
    }

    fn render_aggregated(
        &self,
        aggregated: &HashMap<String, usize>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let mut entries: Vec<(&str, usize)> =
            aggregated.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        // by count, then by phrase length (shortest first)
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.len().cmp(&b.0.len())));

        for (phrase, count) in entries {
            if self.has_prefix {
                writeln!(out, "[{count:5}] ✍  {phrase}")?;
            } else {
                writeln!(out, "{phrase}")?;
            }
        }
        Ok(())
    }
}

fn lemma_text(matched: &[Token]) -> String {
    matched
        .iter()
        .map(|t| t.lemma.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collect the matched lemma phrase of one sentence into the aggregation
/// map. Tokens matched by several chains count once (dedup by sentence
/// position).
fn aggregate_lemmas(matched: &[Token], aggregated: &mut HashMap<String, usize>) {
    let mut unique: Vec<&Token> = Vec::new();
    for token in matched {
        if !unique.iter().any(|t| t.index == token.index) {
            unique.push(token);
        }
    }
    let phrase = unique
        .iter()
        .map(|t| t.lemma.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    *aggregated.entry(phrase).or_insert(0) += 1;
}

/// Serialize matches as a JSON array, for machine consumption.
pub fn to_json(matches: &[SentenceMatch]) -> Result<String> {
    Ok(serde_json::to_string(matches)?)
}
