// SPDX-License-Identifier: AGPL-3.0-or-later

//! Caper interpreter CLI: run one script file.

use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caper")]
#[command(author, version, about = "Caper: a small scripting language interpreter")]
struct Cli {
    /// Script to execute
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;

    let path = cli.input.display();

    let tokens = caper_lexer::tokenize(&source)
        .map_err(|e| miette::miette!("{}: {}", path, e.format_with_source(&source)))?;

    let program = caper_parser::parse(&tokens)
        .map_err(|e| miette::miette!("{}: {}", path, e.format_with_source(&source)))?;

    caper_interp::run(
        &program,
        Box::new(std::io::stdout()),
        Box::new(std::io::stderr()),
    )
    .map_err(|e| miette::miette!("{}: {}", path, e.format_with_source(&source)))?;

    Ok(())
}
