use anyhow::Result;

use segrob::render::Renderer;
use segrob::storage::DocRepository;

use crate::cli::DocArgs;
use crate::commands::open_docs;

pub async fn run(args: DocArgs) -> Result<()> {
    let repo = open_docs(&args.doc_path).await?;
    let doc = repo.read(args.id).await?;

    let start = args.start.min(doc.sentences.len());
    let sentences = doc.sentences[start..].iter();
    let sentences: Vec<_> = match args.number {
        Some(n) => sentences.take(n).collect(),
        None => sentences.collect(),
    };

    let mut renderer = Renderer::new();
    renderer.has_color = false;

    let mut out = std::io::stdout();
    for sentence in sentences {
        let prefix = format!("✍  {} ", sentence.id);
        renderer.render_sentence(&sentence.tokens, &prefix, &mut out)?;
    }
    Ok(())
}
