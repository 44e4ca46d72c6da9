use anyhow::Result;

use segrob::render::Renderer;
use segrob::storage::DocRepository;
use segrob::{topic, Search, SegrobError};

use crate::cli::ExprArgs;
use crate::commands::{open_docs, preload};

pub async fn run(args: ExprArgs) -> Result<()> {
    if args.sent.is_some() && args.doc.is_none() {
        return Err(SegrobError::Usage("--sent flag given but no --doc".to_string()).into());
    }

    // Re-split the arguments on whitespace so quoted expressions behave
    // like the unquoted form: `expr "a 1 el"` equals `expr a 1 el`.
    let fields: Vec<&str> = args
        .items
        .iter()
        .flat_map(|item| item.split_whitespace())
        .collect();
    let expr = topic::parse(&fields)?;

    let repo = open_docs(&args.doc_path).await?;

    let mut renderer = Renderer::new().with_topic_prefix(false);
    renderer.has_color = !args.no_color;
    renderer.has_prefix = !args.no_prefix;
    renderer.format = args.format;
    renderer.num_matches = args.nmatches;

    for meta in repo.list("").await? {
        renderer.add_doc_name(meta.id, &meta.title);
    }

    let mut search = Search::new(repo.as_ref()).with_labels(args.labels.clone());
    match args.doc {
        Some(doc_id) => search = search.with_doc_id(doc_id),
        None => preload(repo.as_ref()).await?,
    }

    let mut matches = search.collect(Some(&expr)).await?;
    if let Some(sent_id) = args.sent {
        matches.retain(|m| m.sentence.id == sent_id);
    }

    renderer.render_matches(&matches, &mut std::io::stdout())?;
    Ok(())
}
