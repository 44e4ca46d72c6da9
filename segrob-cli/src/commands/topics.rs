use anyhow::Result;

use segrob::render::Renderer;
use segrob::storage::{DocRepository, TopicRepository};
use segrob::Matcher;

use crate::cli::TopicsArgs;
use crate::commands::{open_docs, open_topics};

/// Match one sentence against every topic of the library and print the
/// matching ones.
pub async fn run(args: TopicsArgs) -> Result<()> {
    let docs = open_docs(&args.doc_path).await?;
    let doc = docs.read(args.doc_id).await?;
    let sentence = doc.sentence(args.sent_id)?;

    let mut out = std::io::stdout();

    let mut plain = Renderer::new();
    plain.has_color = false;
    let prefix = format!("✍  {} ", sentence.id);
    plain.render_sentence(&sentence.tokens, &prefix, &mut out)?;
    println!();

    let library = open_topics(&args.topic_path).await?.read_all().await?;

    let mut renderer = Renderer::new().with_doc_prefix(false);
    renderer.format = args.format;

    for topic in library.iter() {
        if let Some(m) = Matcher::for_topic(topic).match_sentence(sentence) {
            renderer.render_matches(&[m], &mut out)?;
        }
    }
    Ok(())
}
