//! Aggregation of accepted games into the sorted book file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shakmaty::san::San;
use shakmaty::{Chess, Position};

use crate::format::{self, BookEntry};
use crate::BuildSummary;

#[derive(Debug, Default)]
struct Game {
    moves: Vec<BookEntry>,
}

/// Collects move records for every retained game and writes the final book.
///
/// The output file is created up front so an unwritable path fails before
/// any of the input stream is consumed. Retained games live in sampler
/// slots: the active game is always the last slot, and a reservoir
/// replacement swaps the victim to the back before clearing it.
#[derive(Debug)]
pub struct BookCreator {
    file: File,
    txt_path: PathBuf,
    board: Chess,
    games: Vec<Game>,
    aborted: bool,
}

impl BookCreator {
    /// Open `<basename>.bin` for writing; the `<basename>.txt` sidecar is
    /// written during [`dump_book`](Self::dump_book).
    pub fn create(basename: &Path) -> Result<Self> {
        let bin_path = with_suffix(basename, ".bin");
        let file = File::create(&bin_path)
            .with_context(|| format!("cannot open output file {}", bin_path.display()))?;
        Ok(Self {
            file,
            txt_path: with_suffix(basename, ".txt"),
            board: Chess::default(),
            games: Vec::new(),
            aborted: false,
        })
    }

    pub fn accepted_games(&self) -> usize {
        self.games.len()
    }

    /// Allocate a fresh slot for the game about to be replayed.
    pub fn push_game(&mut self) {
        self.games.push(Game::default());
    }

    /// Discard the occupant of `slot` and reuse it for the incoming game.
    pub fn replace_game(&mut self, slot: usize) {
        let last = self.games.len() - 1;
        self.games.swap(slot, last);
        self.games[last].moves.clear();
    }

    /// Reset the replay board for the newly accepted game.
    pub fn start_moves(&mut self) {
        self.board = Chess::default();
        self.aborted = false;
    }

    /// Whether the current game was dropped after a SAN resolution failure.
    pub fn game_aborted(&self) -> bool {
        self.aborted
    }

    /// Drop everything collected for the current game and ignore the rest
    /// of its body.
    pub fn abort_game(&mut self) {
        if let Some(game) = self.games.last_mut() {
            game.moves.clear();
        }
        self.aborted = true;
    }

    /// Record the move named by `san` at the current position, then apply it.
    pub fn register_san(&mut self, san: &San) -> Result<()> {
        let mv = san
            .to_move(&self.board)
            .with_context(|| format!("SAN '{san}' does not apply to the current position"))?;
        let entry = BookEntry::from_move(&self.board, &mv)?;
        self.games
            .last_mut()
            .expect("an accepted game must be active")
            .moves
            .push(entry);
        self.board.play_unchecked(&mv);
        Ok(())
    }

    /// Sort, collapse, and write all collected records, then the sidecar
    /// summary. Called once after the input stream is exhausted.
    pub fn dump_book(self) -> Result<BuildSummary> {
        let entries: Vec<BookEntry> = self
            .games
            .iter()
            .flat_map(|game| game.moves.iter().copied())
            .collect();
        let records = format::canonicalize(entries);

        let mut writer = BufWriter::new(self.file);
        format::write_entries(&mut writer, &records).context("failed to write book records")?;
        writer.flush().context("failed to flush book file")?;

        let summary = BuildSummary {
            games: self.games.len(),
            moves: records.len(),
        };
        fs::write(
            &self.txt_path,
            format!("Games: {}\nMoves: {}\n", summary.games, summary.moves),
        )
        .with_context(|| format!("cannot write summary {}", self.txt_path.display()))?;
        Ok(summary)
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
