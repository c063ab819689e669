use log::{debug, info, trace};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::rc::Rc;

use crate::cache::EntryCache;
use crate::config::MftConfig;
use crate::entry_reader::EntryReader;
use crate::entry_size::detect_entry_size;
use crate::error::{MftError, Result};
use crate::mft_parser::*;
use crate::stub_scanner::{scan_stubs, StubMap};

/// Random and sequential access to the logical entries of an MFT image.
///
/// Construction detects the entry size and runs the stub pre-pass; entries are then read
/// on demand and kept in a bounded LRU cache.
pub struct MftIndex<R : Read + Seek> {
    reader : R,
    config : MftConfig,
    entry_size : u64,
    stub_map : StubMap,
    cache : EntryCache<Rc<LogicalEntry>>,
}

impl MftIndex<BufReader<File>> {
    pub fn open_path<P : AsRef<Path>>(path : P, config : MftConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        info!("Opened MFT image {}", path.as_ref().display());
        MftIndex::new(BufReader::new(file), config)
    }
}

impl<R : Read + Seek> MftIndex<R> {
    pub fn new(mut reader : R, config : MftConfig) -> Result<Self> {
        let entry_size = detect_entry_size(&mut reader, config.entry_size_override)?;
        let stub_map = scan_stubs(&mut reader, entry_size)?;
        let cache = EntryCache::new(config.cache_capacity);

        info!("MFT image: entry size {}, {} slots, {} logical entries", entry_size, stub_map.total_slots(), stub_map.logical_count());

        Ok(MftIndex { reader, config, entry_size, stub_map, cache })
    }

    pub fn entry_size(&self) -> u64 {
        self.entry_size
    }

    pub fn config(&self) -> &MftConfig {
        &self.config
    }

    pub fn stub_map(&self) -> &StubMap {
        &self.stub_map
    }

    /// Number of independently addressable entries
    pub fn len(&self) -> u64 {
        self.stub_map.logical_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// The logical entry at `number`, with its child records merged in
    pub fn get(&mut self, number : u64) -> Result<Rc<LogicalEntry>> {
        if let Some(entry) = self.cache.get(number) {
            trace!("Cache hit for entry #{}", number);
            return Ok(Rc::clone(entry));
        }

        let entry_reader = EntryReader::new(self.entry_size, &self.config);
        let entry = Rc::new(entry_reader.read_logical(&mut self.reader, &self.stub_map, number)?);

        if let Some((evicted, _)) = self.cache.insert(number, Rc::clone(&entry)) {
            trace!("Evicted entry #{} from the cache", evicted);
        }

        Ok(entry)
    }

    /// One physical record parsed on its own, whether or not it is a child. Not cached.
    pub fn read_physical(&mut self, number : u64) -> Result<LogicalEntry> {
        EntryReader::new(self.entry_size, &self.config).read_physical(&mut self.reader, number)
    }

    /// The bytes of slot `number`, with the fix-up array applied when the configuration asks for it.
    /// Empty slots hold no record and are refused like they are by `get`.
    pub fn read_raw(&mut self, number : u64) -> Result<Vec<u8>> {
        if self.stub_map.is_empty_slot(number) {
            return Err(MftError::EntryIsEmpty(number));
        }

        let mut record = EntryReader::new(self.entry_size, &self.config).read_raw(&mut self.reader, number)?;

        if self.config.apply_fixup_array {
            let header = EntryHeader::parse(&record, number)?;
            apply_fixup(&mut record, header.fixup_offset, header.fixup_count, number)?;
        }

        Ok(record)
    }

    /// Every addressable entry in slot order. Empty slots and child records are skipped.
    pub fn iter(&mut self) -> Entries<'_, R> {
        let expected = self.len();
        debug!("Iterating {} logical entries", expected);
        Entries { index: self, next_slot: 0, visited: 0, expected, finished: false }
    }
}

/// Lazy walk over the logical entries of an `MftIndex`.
///
/// A record that fails to parse is yielded as an error and the walk moves on. Bookkeeping
/// that disagrees with the pre-pass ends the walk with a consistency error.
pub struct Entries<'a, R : Read + Seek> {
    index : &'a mut MftIndex<R>,
    next_slot : u64,
    visited : u64,
    expected : u64,
    finished : bool,
}

impl<'a, R : Read + Seek> Entries<'a, R> {
    fn fail(&mut self, reason : String) -> Option<Result<Rc<LogicalEntry>>> {
        self.finished = true;
        Some(Err(MftError::Consistency(reason)))
    }
}

impl<'a, R : Read + Seek> Iterator for Entries<'a, R> {
    type Item = Result<Rc<LogicalEntry>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let total_slots = self.index.stub_map.total_slots();

        while self.next_slot < total_slots {
            let slot = self.next_slot;
            self.next_slot += 1;

            if !self.index.stub_map.is_addressable(slot) {
                continue;
            }

            self.visited += 1;
            if self.visited > self.expected {
                return self.fail(format!("visited {} entries, only {} are addressable", self.visited, self.expected));
            }

            let result = self.index.get(slot);
            if let Err(MftError::Io(_)) = &result {
                self.finished = true;
            }
            return Some(result);
        }

        self.finished = true;
        if self.visited != self.expected {
            return self.fail(format!("visited {} entries, expected {}", self.visited, self.expected));
        }

        None
    }
}
