use anyhow::Result;

use segrob::stat;
use segrob::storage::DocRepository;
use segrob::Doc;

use crate::cli::StatArgs;
use crate::commands::open_docs;

pub async fn run(args: StatArgs) -> Result<()> {
    let repo = open_docs(&args.doc_path).await?;
    let doc = repo.read(args.doc_id).await?;

    let stats = match args.sent_id {
        Some(sent_id) => {
            let sentence = doc.sentence(sent_id)?.clone();
            stat::aggregate(&Doc {
                sentences: vec![sentence],
                ..Default::default()
            })
        }
        None => stat::aggregate(&doc),
    };

    println!(
        "Num sentences {}, num tokens per sentence {}",
        stats.num_sentences, stats.tokens_per_sentence_mean
    );
    Ok(())
}
