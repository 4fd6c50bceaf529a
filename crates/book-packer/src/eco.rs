//! ECO opening-code enumeration and the matching game filter.

use std::collections::HashSet;

use anyhow::{bail, Result};

fn is_eco_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 3
        && bytes[0].is_ascii_uppercase()
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
}

/// Enumerate the inclusive interval of three-character ECO codes from
/// `start` to `end`.
///
/// Codes succeed each other lexicographically over `[A-Z][0-9][0-9]`: the
/// last digit increments first, carrying into the middle digit and then into
/// the letter (`A99` is followed by `B00`).
pub fn gen_eco_codes(start: &str, end: &str) -> Result<Vec<String>> {
    if !is_eco_code(start) || !is_eco_code(end) {
        bail!("ECO codes must match [A-Z][0-9][0-9], got '{start}'..'{end}'");
    }
    if start > end {
        bail!("ECO interval '{start}'..'{end}' is reversed");
    }
    let mut codes = Vec::new();
    let mut code = start.as_bytes().to_vec();
    while code.as_slice() != end.as_bytes() {
        codes.push(String::from_utf8(code.clone()).unwrap());
        code[2] += 1;
        if code[2] > b'9' {
            code[2] = b'0';
            code[1] += 1;
        }
        if code[1] > b'9' {
            code[1] = b'0';
            code[0] += 1;
        }
    }
    codes.push(end.to_string());
    Ok(codes)
}

/// Admits games whose `ECO` header falls in a fixed set of codes.
#[derive(Debug)]
pub struct EcoFilter {
    valid_codes: HashSet<String>,
    eco: String,
}

impl EcoFilter {
    pub fn new(valid_codes: &[String]) -> Self {
        Self {
            valid_codes: valid_codes.iter().cloned().collect(),
            eco: String::new(),
        }
    }

    pub fn start_pgn(&mut self) {
        self.eco.clear();
    }

    pub fn header(&mut self, key: &str, value: &str) {
        if key == "ECO" {
            self.eco = value.to_string();
        }
    }

    pub fn should_skip(&self) -> bool {
        !self.valid_codes.contains(&self.eco)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_plain_interval() {
        assert_eq!(
            gen_eco_codes("D43", "D49").unwrap(),
            vec!["D43", "D44", "D45", "D46", "D47", "D48", "D49"]
        );
    }

    #[test]
    fn carries_across_digit_and_letter() {
        assert_eq!(gen_eco_codes("A99", "B01").unwrap(), vec!["A99", "B00", "B01"]);
    }

    #[test]
    fn single_code_interval() {
        assert_eq!(gen_eco_codes("C20", "C20").unwrap(), vec!["C20"]);
    }

    #[test]
    fn rejects_reversed_or_malformed_intervals() {
        assert!(gen_eco_codes("B01", "A99").is_err());
        assert!(gen_eco_codes("D4", "D49").is_err());
        assert!(gen_eco_codes("d43", "D49").is_err());
        assert!(gen_eco_codes("D43", "D4x").is_err());
    }

    #[test]
    fn filter_admits_only_codes_in_range() {
        let codes = gen_eco_codes("D43", "D49").unwrap();
        let mut filter = EcoFilter::new(&codes);

        filter.start_pgn();
        filter.header("ECO", "D45");
        assert!(!filter.should_skip());

        filter.start_pgn();
        filter.header("ECO", "D50");
        assert!(filter.should_skip());

        // Header absent entirely.
        filter.start_pgn();
        assert!(filter.should_skip());
    }
}
