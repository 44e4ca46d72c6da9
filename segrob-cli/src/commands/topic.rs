use anyhow::Result;

use segrob::render::Renderer;
use segrob::storage::TopicRepository;

use crate::cli::TopicArgs;
use crate::commands::open_topics;

pub async fn run(args: TopicArgs) -> Result<()> {
    let repo = open_topics(&args.topic_path).await?;

    let Some(name) = args.name else {
        let library = repo.read_all().await?;
        for (id, name) in library.names().iter().enumerate() {
            println!("📖 {id} {name}");
        }
        return Ok(());
    };

    let topic = repo.read(&name).await?;
    let renderer = Renderer::new();
    renderer.render_topic(&topic.exprs, &mut std::io::stdout())?;
    Ok(())
}
