//! Bounded pool of loaded books with least-recently-used eviction.

use std::collections::HashMap;
use std::path::Path;

use book_packer::format::{self, BookEntry};
use log::warn;

/// Total records allowed resident across all loaded books (soft cap, see
/// [`BookStore::get`]).
pub const TOTAL_BUFFER_SIZE_ALLOWED: usize = 1 << 24;

#[derive(Debug, Default)]
struct BookHandle {
    last_touch: u64,
    /// Index into the buffer pool, or `None` while the book is not resident.
    slot: Option<usize>,
}

/// Loaded record buffers keyed by filename.
///
/// Every access stamps the handle with a fresh tick; a load that pushes the
/// resident total past the capacity triggers exactly one eviction of the
/// stalest other handle. Because the pass is single, the total may still
/// exceed the capacity when the evicted book was smaller than the one just
/// loaded.
#[derive(Debug)]
pub struct BookStore {
    capacity: usize,
    buffers: Vec<Vec<BookEntry>>,
    handles: HashMap<String, BookHandle>,
    resident: usize,
    tick: u64,
}

impl BookStore {
    pub fn new() -> Self {
        Self::with_capacity(TOTAL_BUFFER_SIZE_ALLOWED)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            buffers: Vec::new(),
            handles: HashMap::new(),
            resident: 0,
            tick: 0,
        }
    }

    /// Fetch the records of `name`, loading them if not resident.
    ///
    /// A file that cannot be read binds the name to an empty buffer: the
    /// book stays in a load-failed state answering zero edges until it is
    /// closed or evicted.
    pub fn get(&mut self, name: &str) -> &[BookEntry] {
        self.tick += 1;
        let tick = self.tick;
        let handle = self.handles.entry(name.to_string()).or_default();
        handle.last_touch = tick;

        if handle.slot.is_none() {
            let records = match format::read_book(Path::new(name)) {
                Ok(records) => records,
                Err(err) => {
                    warn!("{err:#}");
                    Vec::new()
                }
            };
            let slot = self.buffers.len();
            self.resident += records.len();
            self.buffers.push(records);
            self.handles
                .get_mut(name)
                .expect("handle inserted above")
                .slot = Some(slot);
            if self.resident > self.capacity {
                self.evict_lru(name);
            }
        }

        let slot = self.handles[name].slot.expect("book resident after load");
        &self.buffers[slot]
    }

    /// Drop `name` entirely, freeing its buffer if resident.
    pub fn close(&mut self, name: &str) {
        let Some(handle) = self.handles.remove(name) else {
            return;
        };
        if let Some(slot) = handle.slot {
            self.free_slot(slot);
        }
    }

    /// Number of records currently resident across all books.
    pub fn resident_records(&self) -> usize {
        self.resident
    }

    pub fn is_resident(&self, name: &str) -> bool {
        self.handles
            .get(name)
            .map_or(false, |handle| handle.slot.is_some())
    }

    /// Evict the handle with the smallest tick, excluding the book whose
    /// load triggered the pass (it necessarily holds the newest tick).
    fn evict_lru(&mut self, just_loaded: &str) {
        let victim = self
            .handles
            .iter()
            .filter(|(name, _)| name.as_str() != just_loaded)
            .min_by_key(|(_, handle)| handle.last_touch)
            .map(|(name, _)| name.clone());
        if let Some(victim) = victim {
            self.close(&victim);
        }
    }

    /// Shrink the pool: swap the last buffer into the freed position and fix
    /// the one handle that referenced it.
    fn free_slot(&mut self, slot: usize) {
        self.resident -= self.buffers[slot].len();
        let last = self.buffers.len() - 1;
        if slot != last {
            self.buffers.swap(slot, last);
            for handle in self.handles.values_mut() {
                if handle.slot == Some(last) {
                    handle.slot = Some(slot);
                    break;
                }
            }
        }
        self.buffers.pop();
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_packer::format::write_entries;
    use std::fs::File;
    use std::io::BufWriter;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn entry(zobrist: u64) -> BookEntry {
        BookEntry {
            zobrist,
            from_sq: 12,
            to_sq: 28,
            is_promotion: false,
            promotion_piece: 1,
            count: 1,
        }
    }

    fn write_test_book(dir: &TempDir, name: &str, hashes: &[u64]) -> String {
        let path: PathBuf = dir.path().join(name);
        let entries: Vec<BookEntry> = hashes.iter().map(|&h| entry(h)).collect();
        let mut writer = BufWriter::new(File::create(&path).unwrap());
        write_entries(&mut writer, &entries).unwrap();
        path.display().to_string()
    }

    #[test]
    fn least_recently_used_book_is_evicted_first() {
        let dir = TempDir::new().unwrap();
        let a = write_test_book(&dir, "a.bin", &[1]);
        let b = write_test_book(&dir, "b.bin", &[2]);
        let c = write_test_book(&dir, "c.bin", &[3]);

        let mut store = BookStore::with_capacity(2);
        store.get(&a);
        store.get(&a); // touch A again so it outranks nothing yet
        store.get(&b);
        store.get(&c); // overflow: A is stalest

        assert!(!store.is_resident(&a));
        assert!(store.is_resident(&b));
        assert!(store.is_resident(&c));
        assert_eq!(store.resident_records(), 2);

        // A reloads on demand.
        assert_eq!(store.get(&a), &[entry(1)]);
        assert!(store.is_resident(&a));
    }

    #[test]
    fn surviving_books_keep_their_records_after_compaction() {
        let dir = TempDir::new().unwrap();
        let a = write_test_book(&dir, "a.bin", &[1]);
        let b = write_test_book(&dir, "b.bin", &[2, 20]);
        let c = write_test_book(&dir, "c.bin", &[3]);

        let mut store = BookStore::with_capacity(3);
        store.get(&a);
        store.get(&b);
        store.get(&c); // evicts A, last buffer swaps into its slot

        assert_eq!(store.get(&b), &[entry(2), entry(20)]);
        assert_eq!(store.get(&c), &[entry(3)]);
    }

    #[test]
    fn single_oversized_book_stays_resident() {
        let dir = TempDir::new().unwrap();
        let a = write_test_book(&dir, "a.bin", &[1, 2, 3, 4]);

        let mut store = BookStore::with_capacity(2);
        assert_eq!(store.get(&a).len(), 4);
        // No other handle to evict; the soft cap is simply exceeded.
        assert!(store.is_resident(&a));
        assert_eq!(store.resident_records(), 4);
    }

    #[test]
    fn close_frees_the_buffer_and_forgets_the_handle() {
        let dir = TempDir::new().unwrap();
        let a = write_test_book(&dir, "a.bin", &[1]);
        let b = write_test_book(&dir, "b.bin", &[2]);

        let mut store = BookStore::with_capacity(10);
        store.get(&a);
        store.get(&b);
        store.close(&a);

        assert!(!store.is_resident(&a));
        assert_eq!(store.resident_records(), 1);
        assert_eq!(store.get(&b), &[entry(2)]);
    }

    #[test]
    fn unreadable_file_binds_an_empty_buffer() {
        let mut store = BookStore::with_capacity(10);
        assert!(store.get("/no/such/book.bin").is_empty());
        // Still bound; the failed load is not retried.
        assert!(store.is_resident("/no/such/book.bin"));
        assert!(store.get("/no/such/book.bin").is_empty());
    }
}
