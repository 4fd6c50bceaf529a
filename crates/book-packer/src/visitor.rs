//! The PGN visitor orchestrating filters, sampling, and aggregation.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use pgn_reader::{RawHeader, SanPlus, Skip, Visitor};

use crate::creator::BookCreator;
use crate::eco::EcoFilter;
use crate::filters::{DepthFilter, HeaderFilter};
use crate::sampler::{Decision, Sampler};
use crate::BuildSummary;

/// Consumes parser events for one PGN stream and produces a book.
///
/// Filter order is load-bearing: header and ECO admission run first, and the
/// sampler decides last because a reservoir decision allocates or replaces a
/// slot and must never fire for a game the other filters exclude.
pub struct BookVisitor {
    headers: HeaderFilter,
    eco: EcoFilter,
    depth: DepthFilter,
    sampler: Sampler,
    creator: BookCreator,
    progress: ProgressBar,
}

impl BookVisitor {
    pub fn new(
        creator: BookCreator,
        sampler: Sampler,
        eco_codes: &[String],
        max_depth: u32,
        n_games: u64,
    ) -> Self {
        Self {
            headers: HeaderFilter::new(),
            eco: EcoFilter::new(eco_codes),
            depth: DepthFilter::new(max_depth),
            sampler,
            creator,
            progress: progress_bar(n_games),
        }
    }

    /// Finalize after the stream ends: sort, collapse, and write the book
    /// plus its text sidecar.
    pub fn finish(self) -> Result<BuildSummary> {
        self.progress.finish_with_message("games processed");
        self.creator.dump_book()
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {wide_bar} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb
}

impl Visitor for BookVisitor {
    type Result = ();

    fn begin_game(&mut self) {
        self.headers.start_pgn();
        self.eco.start_pgn();
        self.sampler.start_pgn();
        self.progress.inc(1);
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        let key = match std::str::from_utf8(key) {
            Ok(key) => key,
            Err(_) => return,
        };
        let value = value.decode_utf8_lossy();
        self.headers.header(key, &value);
        self.eco.header(key, &value);
    }

    fn end_headers(&mut self) -> Skip {
        if self.headers.should_skip() || self.eco.should_skip() {
            return Skip(true);
        }
        match self.sampler.decide(self.creator.accepted_games()) {
            Decision::Reject => return Skip(true),
            Decision::Accept => self.creator.push_game(),
            Decision::Replace(slot) => self.creator.replace_game(slot),
        }
        self.progress
            .set_message(format!("accepted {}", self.creator.accepted_games()));
        self.creator.start_moves();
        self.depth.start_moves();
        Skip(false)
    }

    fn san(&mut self, san_plus: SanPlus) {
        if self.creator.game_aborted() {
            return;
        }
        self.depth.on_move();
        if self.depth.should_skip() {
            return;
        }
        if let Err(err) = self.creator.register_san(&san_plus.san) {
            warn!("dropping game: {err:#}");
            self.creator.abort_game();
        }
    }

    fn begin_variation(&mut self) -> Skip {
        // Only the mainline feeds the book.
        Skip(true)
    }

    fn end_game(&mut self) {}
}
