use anyhow::Result;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use segrob::render::Renderer;
use segrob::storage::DocRepository;
use segrob::Token;

use crate::cli::SentenceArgs;
use crate::commands::open_docs;

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "Text")]
    text: String,
    #[tabled(rename = "Lemma")]
    lemma: String,
    #[tabled(rename = "POS")]
    pos: String,
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Head")]
    head: i64,
    #[tabled(rename = "Dep")]
    dep: String,
    #[tabled(rename = "Tag")]
    tag: String,
}

impl From<&Token> for TokenRow {
    fn from(token: &Token) -> Self {
        TokenRow {
            text: token.text.clone(),
            lemma: token.lemma.clone(),
            pos: token.pos.clone(),
            id: token.id,
            head: token.head,
            dep: token.dep.clone(),
            tag: token.tag.clone(),
        }
    }
}

pub async fn run(args: SentenceArgs) -> Result<()> {
    let repo = open_docs(&args.doc_path).await?;
    let doc = repo.read(args.doc_id).await?;
    let sentence = doc.sentence(args.sent_id)?;

    let mut renderer = Renderer::new();
    renderer.has_color = false;

    let mut out = std::io::stdout();
    let prefix = format!("✍  {} ", sentence.id);
    renderer.render_sentence(&sentence.tokens, &prefix, &mut out)?;
    println!();

    let rows: Vec<TokenRow> = sentence.tokens.iter().map(TokenRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}
