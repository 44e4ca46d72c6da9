use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use segrob::render::Format;

/// Sentence dictionary based on NLP topics.
#[derive(Parser)]
#[command(name = "segrob", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show contents of a document.
    Doc(DocArgs),
    /// List all documents in the repository.
    LsDoc(LsDocArgs),
    /// List all unique document labels.
    LsLabels(LsLabelsArgs),
    /// Show a specific sentence and its token details.
    Sentence(SentenceArgs),
    /// Show topics matching a specific sentence.
    Topics(TopicsArgs),
    /// Evaluate a topic expression against the corpus.
    Expr(ExprArgs),
    /// Enter interactive query mode.
    Query(QueryArgs),
    /// Enter interactive topic edit mode.
    Edit(EditArgs),
    /// List topics or show the expressions of one topic.
    Topic(TopicArgs),
    /// Show statistics for a document or sentence.
    Stat(StatArgs),
    /// Import topics from a JSON directory into a SQLite database.
    ImportTopic(TransferArgs),
    /// Export topics from a SQLite database into a JSON directory.
    ExportTopic(TransferArgs),
    /// Import docs from a JSON directory into a SQLite database.
    ImportDoc(TransferArgs),
    /// Export docs from a SQLite database into a JSON directory.
    ExportDoc(TransferArgs),
    /// Convert legacy token-matrix document files to the sentence layout.
    Migrate(TransferArgs),
    /// Output the bash completion script.
    Bash,
    /// Completion backend for the bash script.
    #[command(hide = true)]
    Complete(CompleteArgs),
    /// Print version information.
    Version,
}

#[derive(Args)]
pub struct DocArgs {
    /// Document id.
    pub id: i64,

    /// Index of the first sentence to show.
    #[arg(long, short = 's', default_value_t = 0)]
    pub start: usize,

    /// Number of sentences to show.
    #[arg(long, short = 'n')]
    pub number: Option<usize>,

    /// Path to the docs directory or SQLite file.
    #[arg(long, short = 'd', env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct LsDocArgs {
    /// Only list documents with a label containing this substring.
    #[arg(long = "match", short = 'm', default_value = "")]
    pub label_match: String,

    /// Path to the docs directory or SQLite file.
    #[arg(long, short = 'd', env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct LsLabelsArgs {
    /// Only list labels containing this substring.
    #[arg(long = "match", short = 'm', default_value = "")]
    pub label_match: String,

    /// Path to the docs directory or SQLite file.
    #[arg(long, short = 'd', env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct SentenceArgs {
    /// Document id.
    pub doc_id: i64,

    /// Sentence id inside the document.
    pub sent_id: i64,

    /// Path to the docs directory or SQLite file.
    #[arg(long, short = 'd', env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct TopicsArgs {
    /// Document id.
    pub doc_id: i64,

    /// Sentence id inside the document.
    pub sent_id: i64,

    /// Path to the topics directory or SQLite file.
    #[arg(long, short = 't', env = "SEGROB_TOPIC_PATH")]
    pub topic_path: Option<PathBuf>,

    /// Path to the docs directory or SQLite file.
    #[arg(long, short = 'd', env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,

    /// Sentence output format.
    #[arg(long, short = 'f', default_value = "all", value_parser = parse_format)]
    pub format: Format,
}

#[derive(Args)]
pub struct ExprArgs {
    /// Expression fields: lemmas, Tags and near distances.
    #[arg(required = true)]
    pub items: Vec<String>,

    /// Limit the search to the document with this id.
    #[arg(long, short = 'd')]
    pub doc: Option<i64>,

    /// Limit the search to this sentence. Needs --doc.
    #[arg(long, short = 's')]
    pub sent: Option<i64>,

    /// Only match documents carrying this label. Repeatable.
    #[arg(long = "label", short = 'l')]
    pub labels: Vec<String>,

    /// Show matched sentences without color.
    #[arg(long = "no-color", short = 'c')]
    pub no_color: bool,

    /// Show matched sentences without metadata prefixes.
    #[arg(long = "no-prefix", short = 'x')]
    pub no_prefix: bool,

    /// Only show sentences with at least this many expression matches.
    #[arg(long, short = 'n', default_value_t = 0)]
    pub nmatches: usize,

    /// Sentence output format.
    #[arg(long, short = 'f', default_value = "all", value_parser = parse_format)]
    pub format: Format,

    /// Path to the docs directory or SQLite file.
    #[arg(long, env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Show matched sentences without color.
    #[arg(long = "no-color", short = 'c')]
    pub no_color: bool,

    /// Show matched sentences without metadata prefixes.
    #[arg(long = "no-prefix", short = 'x')]
    pub no_prefix: bool,

    /// Only show sentences with at least this many expression matches.
    #[arg(long, short = 'n', default_value_t = 0)]
    pub nmatches: usize,

    /// Sentence output format.
    #[arg(long, short = 'f', default_value = "all", value_parser = parse_format)]
    pub format: Format,

    /// Path to the topics directory or SQLite file.
    #[arg(long, short = 't', env = "SEGROB_TOPIC_PATH")]
    pub topic_path: Option<PathBuf>,

    /// Path to the docs directory or SQLite file.
    #[arg(long, short = 'd', env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Path to the topics directory or SQLite file.
    #[arg(long, short = 't', env = "SEGROB_TOPIC_PATH")]
    pub topic_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct TopicArgs {
    /// Topic name; without it all topics are listed.
    pub name: Option<String>,

    /// Path to the topics directory or SQLite file.
    #[arg(long, short = 't', env = "SEGROB_TOPIC_PATH")]
    pub topic_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct StatArgs {
    /// Document id.
    pub doc_id: i64,

    /// Optional sentence id; statistics cover only that sentence.
    pub sent_id: Option<i64>,

    /// Path to the docs directory or SQLite file.
    #[arg(long, short = 'd', env = "SEGROB_DOC_PATH")]
    pub doc_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct TransferArgs {
    /// Source path.
    #[arg(long)]
    pub from: PathBuf,

    /// Target path.
    #[arg(long)]
    pub to: PathBuf,
}

#[derive(Args)]
pub struct CompleteArgs {
    /// The words of the command line being completed.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub words: Vec<String>,
}

fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}
