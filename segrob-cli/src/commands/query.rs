use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use segrob::render::Renderer;
use segrob::storage::{DocRepository, TopicRepository};
use segrob::{topic, Library, Search, Topic, TopicExpr};

use crate::cli::QueryArgs;
use crate::commands::{open_docs, open_topics, preload};

/// Interactive query REPL. A line is an optional topic name followed by
/// an optional expression; matches render with the configured format.
pub async fn run(args: QueryArgs) -> Result<()> {
    let docs = open_docs(&args.doc_path).await?;
    preload(docs.as_ref()).await?;

    let library = open_topics(&args.topic_path).await?.read_all().await?;

    let mut renderer = Renderer::new().with_topic_prefix(false);
    renderer.has_color = !args.no_color;
    renderer.has_prefix = !args.no_prefix;
    renderer.format = args.format;
    renderer.num_matches = args.nmatches;
    for meta in docs.list("").await? {
        renderer.add_doc_name(meta.id, &meta.title);
    }

    let mut rl = DefaultEditor::new().context("failed to initialize line editor")?;

    println!("🔑 query: [topic] [expr], 'format' cycles output, 'prefix' toggles metadata, 'quit' exits");

    loop {
        let line = match rl.readline("      🔖 ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        match line {
            "quit" | "exit" => break,
            "help" => {
                print_help(&library);
                continue;
            }
            "format" => {
                renderer.format = renderer.format.next();
                println!("Format set to: {}", renderer.format);
                continue;
            }
            "prefix" => {
                renderer.toggle_prefix();
                println!("Prefix set to: {}", renderer.has_prefix);
                continue;
            }
            _ => {}
        }

        if let Err(err) = handle_query(docs.as_ref(), &library, &renderer, line).await {
            println!("❌ {err:#}");
        }
    }

    println!("Goodbye.");
    Ok(())
}

async fn handle_query(
    docs: &dyn DocRepository,
    library: &Library,
    renderer: &Renderer,
    line: &str,
) -> Result<()> {
    let (topic, expr) = parse_line(library, line)?;

    let mut search = Search::new(docs);
    if let Some(topic) = topic {
        search = search.with_topic(topic);
    }
    let matches = search.collect(expr.as_ref()).await?;
    renderer.render_matches(&matches, &mut std::io::stdout())?;
    Ok(())
}

/// Split a query line into an optional leading topic name and the
/// expression behind it.
fn parse_line<'a>(
    library: &'a Library,
    line: &str,
) -> Result<(Option<&'a Topic>, Option<TopicExpr>)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (topic, rest) = match library.find(fields[0]) {
        Some(topic) => (Some(topic), &fields[1..]),
        None => (None, &fields[..]),
    };

    if topic.is_none() && rest.is_empty() {
        anyhow::bail!("there is no such topic and no expression: {line}");
    }

    let expr = if rest.is_empty() {
        None
    } else {
        Some(topic::parse(rest)?)
    };
    Ok((topic, expr))
}

fn print_help(library: &Library) {
    println!(
        "\
A query is an optional topic name followed by an optional expression:
  <topic>              all sentences matching the topic
  <expr>               all sentences matching the expression
  <topic> <expr>       sentences matching the expression and the topic

Commands:
  format               cycle the output format (all, part, lemma, aggr, json)
  prefix               toggle the metadata prefix
  quit                 exit"
    );
    if !library.is_empty() {
        println!("\nTopics: {}", library.names().join(", "));
    }
}
