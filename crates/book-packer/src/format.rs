//! Packed on-disk record format shared by the builder and the reader.
//!
//! A book file is a bare sequence of 16-byte little-endian records, sorted by
//! `(zobrist, from_sq, to_sq, is_promotion, promotion_piece)` with one record
//! per unique key. There is no header or footer; the record count is implied
//! by the file size.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Role, Square};

/// Size of one packed record in bytes.
pub const ENTRY_SIZE: usize = 16;

/// One position/move record.
///
/// | offset | size | field             |
/// |--------|------|-------------------|
/// | 0      | 8    | `zobrist`         |
/// | 8      | 1    | `from_sq`         |
/// | 9      | 1    | `to_sq`           |
/// | 10     | 1    | `is_promotion`    |
/// | 11     | 1    | `promotion_piece` |
/// | 12     | 4    | `count`           |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub zobrist: u64,
    pub from_sq: u8,
    pub to_sq: u8,
    pub is_promotion: bool,
    /// Role ordinal (`Pawn` = 1 .. `King` = 6); the pawn ordinal when
    /// `is_promotion` is false.
    pub promotion_piece: u8,
    pub count: u32,
}

impl BookEntry {
    /// Build a record for a move about to be played on `pos`, with an
    /// occurrence count of one.
    ///
    /// Squares come from the standard-UCI rendering of the move, so castling
    /// is stored as the king's origin and destination (`e1g1`).
    pub fn from_move(pos: &Chess, mv: &Move) -> Result<Self> {
        match mv.to_uci(CastlingMode::Standard) {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => Ok(Self {
                zobrist: position_hash(pos),
                from_sq: u32::from(from) as u8,
                to_sq: u32::from(to) as u8,
                is_promotion: promotion.is_some(),
                promotion_piece: role_index(promotion.unwrap_or(Role::Pawn)),
                count: 1,
            }),
            other => anyhow::bail!("move {other} has no square pair"),
        }
    }

    /// Decode the stored move as standard UCI, or `None` if a square or role
    /// byte is out of range.
    pub fn uci(&self) -> Option<UciMove> {
        if self.from_sq >= 64 || self.to_sq >= 64 {
            return None;
        }
        let promotion = if self.is_promotion {
            Some(role_from_index(self.promotion_piece)?)
        } else {
            None
        };
        Some(UciMove::Normal {
            from: Square::new(u32::from(self.from_sq)),
            to: Square::new(u32::from(self.to_sq)),
            promotion,
        })
    }

    /// Key the file ordering and collapse are defined over.
    pub fn sort_key(&self) -> (u64, u8, u8, bool, u8) {
        (
            self.zobrist,
            self.from_sq,
            self.to_sq,
            self.is_promotion,
            self.promotion_piece,
        )
    }

    /// Whether two records describe the same edge (everything but `count`).
    pub fn same_edge(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.zobrist.to_le_bytes());
        buf[8] = self.from_sq;
        buf[9] = self.to_sq;
        buf[10] = u8::from(self.is_promotion);
        buf[11] = self.promotion_piece;
        buf[12..16].copy_from_slice(&self.count.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; ENTRY_SIZE]) -> Self {
        Self {
            zobrist: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            from_sq: buf[8],
            to_sq: buf[9],
            is_promotion: buf[10] != 0,
            promotion_piece: buf[11],
            count: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
        }
    }
}

/// 64-bit Zobrist fingerprint of a position.
pub fn position_hash(pos: &Chess) -> u64 {
    let hash: Zobrist64 = pos.zobrist_hash(EnPassantMode::Legal);
    hash.0
}

pub fn role_index(role: Role) -> u8 {
    match role {
        Role::Pawn => 1,
        Role::Knight => 2,
        Role::Bishop => 3,
        Role::Rook => 4,
        Role::Queen => 5,
        Role::King => 6,
    }
}

pub fn role_from_index(index: u8) -> Option<Role> {
    match index {
        1 => Some(Role::Pawn),
        2 => Some(Role::Knight),
        3 => Some(Role::Bishop),
        4 => Some(Role::Rook),
        5 => Some(Role::Queen),
        6 => Some(Role::King),
        _ => None,
    }
}

/// Sort entries into the canonical file order and collapse runs sharing a
/// key, summing their counts. Applying this to an already canonical list is
/// a no-op.
pub fn canonicalize(mut entries: Vec<BookEntry>) -> Vec<BookEntry> {
    entries.sort_by_key(BookEntry::sort_key);
    let mut out: Vec<BookEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out.last_mut() {
            Some(last) if last.same_edge(&entry) => last.count += entry.count,
            _ => out.push(entry),
        }
    }
    out
}

/// Serialize records in order.
pub fn write_entries<W: Write>(writer: &mut W, entries: &[BookEntry]) -> std::io::Result<()> {
    for entry in entries {
        writer.write_all(&entry.to_bytes())?;
    }
    Ok(())
}

/// Load a book file into memory.
///
/// The file is expected pre-sorted; no validation is performed beyond
/// dropping a trailing partial record.
pub fn read_book(path: &Path) -> Result<Vec<BookEntry>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to open book {}", path.display()))?;
    let mut entries = Vec::with_capacity(bytes.len() / ENTRY_SIZE);
    let mut chunks = bytes.chunks_exact(ENTRY_SIZE);
    for chunk in &mut chunks {
        entries.push(BookEntry::from_bytes(chunk.try_into().unwrap()));
    }
    if !chunks.remainder().is_empty() {
        warn!(
            "book {} has {} trailing bytes, truncating to last full record",
            path.display(),
            chunks.remainder().len()
        );
    }
    Ok(entries)
}
