//! Corpus and topic movement between the two backends, plus the legacy
//! format migration.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use segrob::storage::filesystem::{FsDocStore, FsTopicStore};
use segrob::storage::sqlite::{
    connect, create_doc_schema, create_topic_schema, SqliteDocStore, SqliteTopicStore,
};
use segrob::storage::{DocRepository, TopicRepository};
use segrob::{Doc, Sentence, Token};

use crate::cli::TransferArgs;

pub async fn import_docs(args: TransferArgs) -> Result<()> {
    let src = FsDocStore::open(&args.from)?;

    let pool = connect(&args.to).await?;
    create_doc_schema(&pool)
        .await
        .context("failed to set up the docs schema")?;
    let dst = SqliteDocStore::new(pool);

    let metas = src.list("").await?;
    eprintln!(
        "Importing {} docs from {} to {}...",
        metas.len(),
        args.from.display(),
        args.to.display()
    );

    for (count, meta) in metas.iter().enumerate() {
        let doc = src
            .read(meta.id)
            .await
            .with_context(|| format!("failed to read doc {}", meta.title))?;
        dst.write(&doc)
            .await
            .with_context(|| format!("failed to write doc {}", meta.title))?;
        eprintln!("[{}/{}] Imported {}", count + 1, metas.len(), meta.title);
    }

    println!(
        "Successfully imported {} docs from {} to {}",
        metas.len(),
        args.from.display(),
        args.to.display()
    );
    Ok(())
}

pub async fn export_docs(args: TransferArgs) -> Result<()> {
    let pool = connect(&args.from).await?;
    let src = SqliteDocStore::new(pool);

    fs::create_dir_all(&args.to).context("failed to create target directory")?;

    let metas = src.list("").await?;
    for (count, meta) in metas.iter().enumerate() {
        let doc = src.read(meta.id).await?;
        let data = serde_json::to_string_pretty(&doc)?;
        let target = args.to.join(&meta.title);
        fs::write(&target, data)
            .with_context(|| format!("failed to write file {}", target.display()))?;
        eprintln!("[{}/{}] Exported {}", count + 1, metas.len(), meta.title);
    }

    println!(
        "Successfully exported {} docs from {} to {}",
        metas.len(),
        args.from.display(),
        args.to.display()
    );
    Ok(())
}

pub async fn import_topics(args: TransferArgs) -> Result<()> {
    let src = FsTopicStore::new(&args.from);

    let pool = connect(&args.to).await?;
    create_topic_schema(&pool)
        .await
        .context("failed to set up the topics schema")?;
    let dst = SqliteTopicStore::new(pool);

    let library = src.read_all().await?;
    for topic in library.iter() {
        dst.write(topic)
            .await
            .with_context(|| format!("failed to import topic {}", topic.name))?;
    }

    println!(
        "Successfully imported {} topics from {} to {}",
        library.len(),
        args.from.display(),
        args.to.display()
    );
    Ok(())
}

pub async fn export_topics(args: TransferArgs) -> Result<()> {
    let pool = connect(&args.from).await?;
    let src = SqliteTopicStore::new(pool);

    fs::create_dir_all(&args.to).context("failed to create target directory")?;
    let dst = FsTopicStore::new(&args.to);

    let library = src.read_all().await?;
    for topic in library.iter() {
        dst.write(topic)
            .await
            .with_context(|| format!("failed to export topic {}", topic.name))?;
    }

    println!(
        "Successfully exported {} topics from {} to {}",
        library.len(),
        args.from.display(),
        args.to.display()
    );
    Ok(())
}

/// The layout that predates the sentence struct: one token matrix per
/// document, sentence ids only inside the tokens.
#[derive(Deserialize)]
struct LegacyDoc {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    tokens: Vec<Vec<Token>>,
}

pub async fn migrate(args: TransferArgs) -> Result<()> {
    fs::create_dir_all(&args.to).context("failed to create target directory")?;

    let mut count = 0;
    for entry in fs::read_dir(&args.from).context("failed to read source directory")? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let doc = migrate_file(&path)
            .with_context(|| format!("failed to migrate legacy doc {name}"))?;

        let data = serde_json::to_string_pretty(&doc)?;
        let target = args.to.join(&name);
        fs::write(&target, data)
            .with_context(|| format!("failed to write file {}", target.display()))?;
        eprintln!("Migrated {} to {}", name, target.display());
        count += 1;
    }

    println!(
        "Successfully migrated {} docs from {} to {}",
        count,
        args.from.display(),
        args.to.display()
    );
    Ok(())
}

fn migrate_file(path: &Path) -> Result<Doc> {
    let data = fs::read(path)?;
    let legacy: LegacyDoc = serde_json::from_slice(&data)?;

    let mut doc = Doc {
        labels: legacy.labels,
        ..Default::default()
    };
    for (id, tokens) in legacy.tokens.into_iter().enumerate() {
        doc.sentences.push(Sentence {
            id: id as i64,
            doc_id: 0,
            tokens,
        });
    }
    Ok(doc)
}
