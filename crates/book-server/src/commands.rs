//! Line protocol: parsing, dispatch, and response framing.

use std::io::Write;

use log::warn;

use crate::query;
use crate::store::BookStore;

/// What the command loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

/// One interactive session: the book pool plus the current-book selection.
///
/// The current book is the target of `positionfromseq`, of the six-argument
/// `fromfen` form, and of `closebook`; it is set by the optional CLI path
/// and re-pointed by `openbook`.
pub struct Session {
    store: BookStore,
    current: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_store(BookStore::new())
    }

    pub fn with_store(store: BookStore) -> Self {
        Self {
            store,
            current: None,
        }
    }

    /// Make `name` the current book and load it. Load errors go to stderr;
    /// the name stays selected and answers zero edges.
    pub fn open_book(&mut self, name: &str) {
        self.current = Some(name.to_string());
        self.store.get(name);
    }

    /// Handle one input line. Responses go to `out`; diagnostics to stderr.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> std::io::Result<Outcome> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(Outcome::Continue);
        };
        let args: Vec<&str> = parts.collect();

        match command {
            "exit" | "quit" => return Ok(Outcome::Quit),
            "openbook" => match args.as_slice() {
                [name] => self.open_book(name),
                _ => warn!("Usage: openbook <path>"),
            },
            "closebook" => {
                if !args.is_empty() {
                    warn!("Usage: closebook");
                } else if let Some(name) = self.current.take() {
                    self.store.close(&name);
                } else {
                    warn!("closebook: no book is open");
                }
            }
            "fromfen" => self.cmd_fromfen(&args, out)?,
            "positionfromseq" => self.cmd_positionfromseq(&args, out)?,
            _ => warn!("unknown command '{command}'"),
        }
        Ok(Outcome::Continue)
    }

    fn cmd_fromfen<W: Write>(&mut self, args: &[&str], out: &mut W) -> std::io::Result<()> {
        let (book, fen_fields) = match args.len() {
            7 => (Some(args[0].to_string()), &args[1..]),
            6 => (self.current.clone(), args),
            _ => {
                warn!("Usage: fromfen [book] <6 fen fields>");
                return Ok(());
            }
        };
        let Some(book) = book else {
            warn!("fromfen: no book is open");
            return Ok(());
        };
        match query::hash_from_fen(&fen_fields.join(" ")) {
            Ok(hash) => self.respond(&book, hash, out),
            Err(err) => {
                warn!("fromfen: {err:#}");
                Ok(())
            }
        }
    }

    fn cmd_positionfromseq<W: Write>(
        &mut self,
        args: &[&str],
        out: &mut W,
    ) -> std::io::Result<()> {
        let plies: Option<usize> = args.first().and_then(|n| n.parse().ok());
        let Some(plies) = plies else {
            warn!("Usage: positionfromseq <n> <uci moves...>");
            return Ok(());
        };
        if args.len() != plies.saturating_add(1) {
            warn!(
                "positionfromseq: expected {} moves, got {}",
                plies,
                args.len() - 1
            );
            return Ok(());
        }
        let Some(book) = self.current.clone() else {
            warn!("positionfromseq: no book is open");
            return Ok(());
        };
        match query::hash_from_moves(&args[1..]) {
            Ok(hash) => self.respond(&book, hash, out),
            Err(err) => {
                warn!("positionfromseq: {err:#}");
                Ok(())
            }
        }
    }

    fn respond<W: Write>(&mut self, book: &str, hash: u64, out: &mut W) -> std::io::Result<()> {
        let records = self.store.get(book);
        let edges = query::edges_for_hash(records, hash);
        writeln!(out, "positionmoves {}", edges.len())?;
        for edge in &edges {
            writeln!(out, "{} {}", edge.uci, edge.count)?;
        }
        out.flush()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_packer::format::{self, BookEntry};
    use shakmaty::san::San;
    use shakmaty::{Chess, Position};
    use std::fs::File;
    use std::io::BufWriter;
    use tempfile::TempDir;

    const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// A two-record book: e2e4 from the start position, e7e5 after it.
    fn write_test_book(dir: &TempDir) -> String {
        let mut pos = Chess::default();
        let e4 = "e4".parse::<San>().unwrap().to_move(&pos).unwrap();
        let first = BookEntry {
            count: 3,
            ..BookEntry::from_move(&pos, &e4).unwrap()
        };
        pos.play_unchecked(&e4);
        let e5 = "e5".parse::<San>().unwrap().to_move(&pos).unwrap();
        let second = BookEntry::from_move(&pos, &e5).unwrap();

        let path = dir.path().join("book.bin");
        let mut writer = BufWriter::new(File::create(&path).unwrap());
        format::write_entries(&mut writer, &format::canonicalize(vec![first, second])).unwrap();
        path.display().to_string()
    }

    fn run(session: &mut Session, line: &str) -> (String, Outcome) {
        let mut out = Vec::new();
        let outcome = session.handle_line(line, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), outcome)
    }

    #[test]
    fn fromfen_lists_edges_for_the_current_book() {
        let dir = TempDir::new().unwrap();
        let book = write_test_book(&dir);
        let mut session = Session::new();
        session.open_book(&book);

        let (output, outcome) = run(&mut session, &format!("fromfen {STARTPOS}"));
        assert_eq!(output, "positionmoves 1\ne2e4 3\n");
        assert_eq!(outcome, Outcome::Continue);
    }

    #[test]
    fn fromfen_accepts_an_explicit_book_name() {
        let dir = TempDir::new().unwrap();
        let book = write_test_book(&dir);
        let mut session = Session::new();

        let (output, _) = run(&mut session, &format!("fromfen {book} {STARTPOS}"));
        assert_eq!(output, "positionmoves 1\ne2e4 3\n");
    }

    #[test]
    fn positionfromseq_matches_the_equivalent_fen_query() {
        let dir = TempDir::new().unwrap();
        let book = write_test_book(&dir);
        let mut session = Session::new();
        session.open_book(&book);

        let (by_seq, _) = run(&mut session, "positionfromseq 1 e2e4");
        let (by_fen, _) = run(
            &mut session,
            "fromfen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
        );
        assert_eq!(by_seq, "positionmoves 1\ne7e5 1\n");
        assert_eq!(by_seq, by_fen);
    }

    #[test]
    fn unknown_position_answers_zero_moves() {
        let dir = TempDir::new().unwrap();
        let book = write_test_book(&dir);
        let mut session = Session::new();
        session.open_book(&book);

        let (output, _) = run(&mut session, "positionfromseq 2 d2d4 d7d5");
        assert_eq!(output, "positionmoves 0\n");
    }

    #[test]
    fn closebook_clears_the_current_selection() {
        let dir = TempDir::new().unwrap();
        let book = write_test_book(&dir);
        let mut session = Session::new();
        session.open_book(&book);

        let (output, _) = run(&mut session, "closebook");
        assert!(output.is_empty());
        // Without a current book the query is ignored.
        let (output, _) = run(&mut session, &format!("fromfen {STARTPOS}"));
        assert!(output.is_empty());
    }

    #[test]
    fn malformed_and_unknown_commands_emit_nothing() {
        let mut session = Session::new();
        for line in [
            "",
            "fromfen",
            "fromfen too few fields",
            "positionfromseq x e2e4",
            "positionfromseq 2 e2e4",
            "positionfromseq 18446744073709551615",
            "flibbertigibbet",
        ] {
            let (output, outcome) = run(&mut session, line);
            assert!(output.is_empty(), "line '{line}' produced output");
            assert_eq!(outcome, Outcome::Continue);
        }
    }

    #[test]
    fn exit_and_quit_stop_the_loop() {
        let mut session = Session::new();
        assert_eq!(run(&mut session, "exit").1, Outcome::Quit);
        assert_eq!(run(&mut session, "quit").1, Outcome::Quit);
    }

    #[test]
    fn missing_book_file_answers_zero_moves() {
        let mut session = Session::new();
        session.open_book("/no/such/book.bin");
        let (output, _) = run(&mut session, &format!("fromfen {STARTPOS}"));
        assert_eq!(output, "positionmoves 0\n");
    }
}
