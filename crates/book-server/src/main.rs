mod commands;
mod query;
mod store;

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use crate::commands::{Outcome, Session};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Serve opening-book queries over a line protocol on stdin"
)]
struct Cli {
    /// Book file to open at startup
    book: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut session = Session::new();
    if let Some(book) = &cli.book {
        session.open_book(&book.display().to_string());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        if session.handle_line(&line, &mut stdout)? == Outcome::Quit {
            break;
        }
    }
    // EOF is treated like `quit`.
    Ok(())
}
