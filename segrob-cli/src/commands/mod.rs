mod bash;
mod doc;
mod edit;
mod expr;
mod ls;
mod query;
mod sentence;
mod stat;
mod topic;
mod topics;
mod transfer;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;

use segrob::storage::{self, DocRepository, Preloader, TopicRepository};
use segrob::SegrobError;

use crate::cli::Command;

pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Doc(args) => doc::run(args).await,
        Command::LsDoc(args) => ls::run_docs(args).await,
        Command::LsLabels(args) => ls::run_labels(args).await,
        Command::Sentence(args) => sentence::run(args).await,
        Command::Topics(args) => topics::run(args).await,
        Command::Expr(args) => expr::run(args).await,
        Command::Query(args) => query::run(args).await,
        Command::Edit(args) => edit::run(args).await,
        Command::Topic(args) => topic::run(args).await,
        Command::Stat(args) => stat::run(args).await,
        Command::ImportTopic(args) => transfer::import_topics(args).await,
        Command::ExportTopic(args) => transfer::export_topics(args).await,
        Command::ImportDoc(args) => transfer::import_docs(args).await,
        Command::ExportDoc(args) => transfer::export_docs(args).await,
        Command::Migrate(args) => transfer::migrate(args).await,
        Command::Bash => bash::run(),
        Command::Complete(args) => bash::complete(args),
        Command::Version => {
            println!("segrob version {}", segrob::VERSION);
            Ok(())
        }
    }
}

/// Resolve the document source path: flag beats environment, nothing
/// means a usage error.
pub fn require_doc_path(path: &Option<PathBuf>) -> Result<&Path, SegrobError> {
    path.as_deref().ok_or_else(|| {
        SegrobError::Usage(
            "document source must be specified via --doc-path or SEGROB_DOC_PATH".to_string(),
        )
    })
}

/// Resolve the topic source path, same precedence as
/// [`require_doc_path`].
pub fn require_topic_path(path: &Option<PathBuf>) -> Result<&Path, SegrobError> {
    path.as_deref().ok_or_else(|| {
        SegrobError::Usage(
            "topic source must be specified via --topic-path or SEGROB_TOPIC_PATH".to_string(),
        )
    })
}

pub async fn open_docs(path: &Option<PathBuf>) -> Result<Box<dyn DocRepository>> {
    Ok(storage::open_doc_repository(require_doc_path(path)?).await?)
}

pub async fn open_topics(path: &Option<PathBuf>) -> Result<Box<dyn TopicRepository>> {
    Ok(storage::open_topic_repository(require_topic_path(path)?).await?)
}

/// Preload the repository when it supports it, with a progress line on
/// stderr. A no-op for indexed backends.
pub async fn preload(repo: &dyn DocRepository) -> Result<()> {
    let Some(preloader) = repo.preloader() else {
        return Ok(());
    };

    let mut err = std::io::stderr();
    preloader
        .load_nlp(&[], None, &mut |current, total, title| {
            let _ = write!(err, "\r📖 Loading docs: {current}/{total} ({title})...\x1b[K");
            let _ = err.flush();
        })
        .await?;
    eprintln!();
    Ok(())
}
