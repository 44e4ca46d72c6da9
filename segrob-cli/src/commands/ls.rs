use anyhow::Result;

use segrob::storage::DocRepository;

use crate::cli::{LsDocArgs, LsLabelsArgs};
use crate::commands::open_docs;

pub async fn run_docs(args: LsDocArgs) -> Result<()> {
    let repo = open_docs(&args.doc_path).await?;
    for meta in repo.list(&args.label_match).await? {
        if meta.labels.is_empty() {
            println!("📖 {} {}", meta.id, meta.title);
        } else {
            println!("📖 {} {} 🔖 {}", meta.id, meta.title, meta.labels.join(", "));
        }
    }
    Ok(())
}

pub async fn run_labels(args: LsLabelsArgs) -> Result<()> {
    let repo = open_docs(&args.doc_path).await?;
    let labels = repo.labels(&args.label_match).await?;
    if !labels.is_empty() {
        println!("{}", labels.join(", "));
    }
    Ok(())
}
