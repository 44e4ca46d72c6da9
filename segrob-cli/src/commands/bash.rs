use anyhow::Result;

use crate::cli::CompleteArgs;

const COMPLETION_SCRIPT: &str = r#"#! /bin/bash

_segrob_autocomplete() {
    local cur

    # Try to initialize using bash-completion if available
    if declare -F _init_completion >/dev/null 2>&1; then
        _init_completion -n "=:" 2>/dev/null
    fi

    # Fallback if cur is not set (e.g. _init_completion failed or missing)
    if [[ -z "$cur" ]]; then
        cur="${COMP_WORDS[COMP_CWORD]}"
    fi

    # call segrob complete with all words; -- passes the user's command
    # line through safely
    local suggestions=$(segrob complete -- "${COMP_WORDS[@]}")

    if [ $? -eq 0 ]; then
        COMPREPLY=( $(compgen -W "$suggestions" -- "$cur") )
    fi
}

complete -F _segrob_autocomplete segrob
"#;

const COMMANDS: &[&str] = &[
    "doc",
    "ls-doc",
    "ls-labels",
    "sentence",
    "topics",
    "expr",
    "query",
    "edit",
    "topic",
    "stat",
    "import-topic",
    "export-topic",
    "import-doc",
    "export-doc",
    "migrate",
    "bash",
    "version",
    "help",
];

pub fn run() -> Result<()> {
    print!("{COMPLETION_SCRIPT}");
    Ok(())
}

/// Completion backend invoked by the bash script with the full
/// `COMP_WORDS` array: `words[0]` is the binary name.
pub fn complete(args: CompleteArgs) -> Result<()> {
    for suggestion in completions(&args.words) {
        println!("{suggestion}");
    }
    Ok(())
}

fn completions(words: &[String]) -> Vec<&'static str> {
    // Only the subcommand position completes; flags and arguments vary
    // per backend and are left to the shell.
    if words.len() != 2 {
        return Vec::new();
    }

    let prefix = words[1].as_str();
    COMMANDS
        .iter()
        .filter(|c| c.starts_with(prefix))
        .copied()
        .collect()
}
