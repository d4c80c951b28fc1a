use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ocra::{Attribute, Grammar, Registry, Theme, ThemeTrie};

#[derive(Parser)]
#[command(name = "ocra")]
#[command(about = "Prints the tokens of a file with their scopes and foreground color")]
struct Args {
    /// File to highlight
    file: PathBuf,
    /// TextMate grammar (JSON) to use instead of guessing from the file extension
    #[arg(long)]
    grammar: Option<PathBuf>,
    /// Theme (JSON) used to resolve the colors
    #[arg(long)]
    theme: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let content = fs::read_to_string(&args.file)?;

    let mut registry = Registry::new();
    let extension = match &args.grammar {
        Some(path) => {
            let grammar = Grammar::load_from_file(path)?;
            let extension = grammar.file_types.first().cloned().unwrap_or_default();
            registry.add_grammar(grammar);
            extension
        }
        None => args
            .file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    let theme = match &args.theme {
        Some(path) => Arc::new(ThemeTrie::from_theme(&Theme::load_from_file(path)?)),
        None => registry.default_theme(),
    };

    let highlighter = registry.highlighter_for(&extension, content);
    for line in 0..highlighter.line_count() {
        let Some(tokens) = highlighter.line_tokens(line) else {
            continue;
        };
        let text = highlighter.line_text(line).unwrap_or_default();
        for token in tokens {
            let foreground = theme
                .resolve_scopes(&token.scopes, false)
                .into_iter()
                .find_map(|a| match a {
                    Attribute::Foreground(c) => Some(c.as_hex()),
                    _ => None,
                })
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}:{} {:?} {}",
                line + 1,
                token,
                &text[token.span.clone()],
                foreground
            );
        }
    }

    Ok(())
}
