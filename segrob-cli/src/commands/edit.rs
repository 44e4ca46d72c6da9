use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use segrob::storage::TopicRepository;
use segrob::{topic, Library, Topic, TopicExpr};

use crate::cli::EditArgs;
use crate::commands::open_topics;

enum Action {
    Add,
    Delete,
}

/// Interactive topic editor. `<topic> <expr...>` appends the expression
/// to the topic; a trailing `/` on the last field removes it instead. An
/// expression disappears by removing all its items.
pub async fn run(args: EditArgs) -> Result<()> {
    let repo = open_topics(&args.topic_path).await?;
    let mut library = repo.read_all().await?;

    let mut rl = DefaultEditor::new().context("failed to initialize line editor")?;

    println!("🔑 edit: <topic> <expr> adds, trailing / deletes, 'quit' exits");

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

        if line == "quit" || line == "exit" {
            break;
        }

        let (mut topic, expr, action) = match parse_line(&library, line) {
            Ok(parsed) => parsed,
            Err(err) => {
                println!("❌ {err:#}");
                continue;
            }
        };

        match action {
            Action::Add => {
                if topic.contains_expr(&expr) {
                    println!("❌ Expression already exists.");
                    continue;
                }
                topic.exprs.push(expr);
            }
            Action::Delete => {
                if !topic.remove_expr(&expr) {
                    println!("❌ Expression does not exist.");
                    continue;
                }
            }
        }

        repo.write(&topic).await?;

        // refresh the in-memory library from storage after the write
        let name = topic.name.clone();
        let reloaded = repo.read(&name).await?;
        if let Some(slot) = library.0.iter_mut().find(|t| t.name == name) {
            *slot = reloaded;
        }
    }

    Ok(())
}

fn parse_line(library: &Library, line: &str) -> Result<(Topic, TopicExpr, Action)> {
    let mut fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();

    let mut action = Action::Add;
    if let Some(last) = fields.last_mut() {
        if let Some(stripped) = last.strip_suffix('/') {
            action = Action::Delete;
            if stripped.is_empty() {
                fields.pop();
            } else {
                *last = stripped.to_string();
            }
        }
    }

    if fields.is_empty() {
        anyhow::bail!("no topic given");
    }

    let name = &fields[0];
    let topic = library
        .iter()
        .find(|t| t.name.starts_with(name.as_str()))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("there is no such topic: {name}"))?;

    let expr_fields = &fields[1..];
    if expr_fields.is_empty() {
        anyhow::bail!("no expression given");
    }

    let expr = topic::parse(expr_fields)?;
    Ok((topic, expr, action))
}
