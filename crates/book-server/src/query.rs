//! Position construction and book lookup.

use anyhow::{Context, Result};
use book_packer::format::{position_hash, BookEntry};
use log::warn;
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Position};

/// A decoded outgoing move with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub uci: UciMove,
    pub count: u32,
}

/// Collect every edge recorded for `hash`, most frequent first.
///
/// The book is globally sorted by hash, so the matching records form one
/// contiguous run starting at the lower bound. Ties keep their file order
/// (the sort is stable).
pub fn edges_for_hash(records: &[BookEntry], hash: u64) -> Vec<Edge> {
    let start = records.partition_point(|entry| entry.zobrist < hash);
    let mut edges = Vec::new();
    for entry in records[start..].iter().take_while(|e| e.zobrist == hash) {
        match entry.uci() {
            Some(uci) => edges.push(Edge {
                uci,
                count: entry.count,
            }),
            None => warn!(
                "skipping record with invalid squares {}->{}",
                entry.from_sq, entry.to_sq
            ),
        }
    }
    edges.sort_by(|a, b| b.count.cmp(&a.count));
    edges
}

/// Hash of the position described by a full six-field FEN.
pub fn hash_from_fen(fen: &str) -> Result<u64> {
    let fen: Fen = fen.parse().with_context(|| format!("invalid FEN '{fen}'"))?;
    let pos: Chess = fen
        .into_position(CastlingMode::Standard)
        .context("FEN is not a legal position")?;
    Ok(position_hash(&pos))
}

/// Hash of the position reached by playing `moves` (UCI) from the standard
/// start position.
pub fn hash_from_moves(moves: &[&str]) -> Result<u64> {
    let mut pos = Chess::default();
    for text in moves {
        let uci: UciMove = text
            .parse()
            .with_context(|| format!("invalid UCI move '{text}'"))?;
        let mv = uci
            .to_move(&pos)
            .with_context(|| format!("move '{text}' is not playable"))?;
        pos.play_unchecked(&mv);
    }
    Ok(position_hash(&pos))
}
