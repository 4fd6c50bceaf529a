use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use book_packer::{gen_eco_codes, BookCreator, BookVisitor, Sampler};
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use pgn_reader::BufferedReader;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Build an opening book from a PGN stream on stdin"
)]
struct Cli {
    /// Output basename; writes <basename>.bin and <basename>.txt
    output: PathBuf,

    /// Expected number of games on stdin (drives progress reporting)
    n_games: u64,

    /// Reservoir capacity, or the acceptance denominator with --bernoulli
    accept_param: u32,

    /// Maximum book depth in halfmoves
    max_depth: u32,

    /// First ECO code of the accepted interval (inclusive)
    start_eco: String,

    /// Last ECO code of the accepted interval (inclusive)
    end_eco: String,

    /// Random generator seed
    seed: u64,

    /// Accept each game with probability 1/accept_param instead of keeping a
    /// reservoir of accept_param games
    #[arg(long)]
    bernoulli: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let eco_codes = match gen_eco_codes(&cli.start_eco, &cli.end_eco) {
        Ok(codes) => codes,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(2);
        }
    };

    match run(&cli, &eco_codes) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, eco_codes: &[String]) -> Result<()> {
    let sampler = if cli.bernoulli {
        Sampler::bernoulli(cli.accept_param, cli.seed)
    } else {
        Sampler::reservoir(cli.accept_param as usize, cli.seed)
    };
    let creator = BookCreator::create(&cli.output)?;
    let mut visitor = BookVisitor::new(creator, sampler, eco_codes, cli.max_depth, cli.n_games);

    let stdin = io::stdin();
    let mut reader = BufferedReader::new(stdin.lock());
    reader.read_all(&mut visitor)?;

    let summary = visitor.finish()?;
    info!("Dumped {} edges from {} games", summary.moves, summary.games);
    Ok(())
}
