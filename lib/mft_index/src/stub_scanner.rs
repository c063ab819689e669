use log::{debug, trace, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Read, Seek, SeekFrom};

use crate::common::*;
use crate::error::{MftError, Result};
use crate::slice_utils::*;

/// The minimal facts about one slot, taken straight from the header prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStub {
    pub record_number : u64,
    pub sequence_number : u16,
    pub base_record_ref : u64,
    pub base_record_seq : u16,
}

impl EntryStub {
    const ES_SEQUENCE_NUMBER : MftDataField<u16> = MftDataField::<u16>::new("SequenceNumber", FRSH_SEQUENCE_NUMBER_OFFSET);
    const ES_BASE_RECORD_ADDRESS : MftDataField<u48> = MftDataField::<u48>::new("BaseRecordAddress", FRSH_BASE_RECORD_OFFSET);
    const ES_BASE_RECORD_SEQ_ID : MftDataField<u16> = MftDataField::<u16>::new("BaseRecordSequenceId", FRSH_BASE_RECORD_SEQUENCE_OFFSET);

    /// Decodes a stub from the header prefix of a slot. The fix-up array is deliberately not applied:
    /// every field read here sits before the first fix-up location.
    pub fn parse(stub : &[u8], record_number : u64) -> Result<Self> {
        let header_error = |reason : &str| MftError::Header { entry: record_number, reason: reason.to_owned(), raw: stub.to_vec() };

        Ok(EntryStub {
            record_number,
            sequence_number: Self::ES_SEQUENCE_NUMBER.read(stub).ok_or_else(|| header_error("stub too short for sequence number"))?,
            base_record_ref: Self::ES_BASE_RECORD_ADDRESS.read(stub).ok_or_else(|| header_error("stub too short for base record reference"))?.into(),
            base_record_seq: Self::ES_BASE_RECORD_SEQ_ID.read(stub).ok_or_else(|| header_error("stub too short for base record sequence"))?,
        })
    }

    pub fn is_base_record(&self) -> bool {
        self.base_record_ref == 0
    }

    /// True when `self` is a physical fragment of `base`. An entry is never its own child.
    pub fn is_child_of(&self, base : &EntryStub) -> bool {
        self.record_number != base.record_number
            && self.base_record_ref == base.record_number
            && self.base_record_seq == base.sequence_number
    }
}

/// Output of the structural pre-pass. Built once, never mutated afterwards.
#[derive(Debug, Default)]
pub struct StubMap {
    stubs : Vec<Option<EntryStub>>,
    empty : BTreeSet<u64>,
    children : BTreeMap<u64, Vec<u64>>,
    parents : HashMap<u64, u64>,
}

impl StubMap {
    /// Builds the relation maps from per-slot stubs, `None` marking an empty slot
    pub fn from_stubs(stubs : Vec<Option<EntryStub>>) -> Self {
        let empty = stubs.iter()
            .enumerate()
            .filter(|(_, stub)| stub.is_none())
            .map(|(slot, _)| slot as u64)
            .collect();

        let mut children = BTreeMap::<u64, Vec<u64>>::new();
        let mut parents = HashMap::<u64, u64>::new();

        for stub in stubs.iter().flatten() {
            if stub.is_base_record() {
                continue;
            }

            let base = stubs.get(stub.base_record_ref as usize).copied().flatten();
            match base {
                Some(base) if stub.is_child_of(&base) => {
                    children.entry(base.record_number).or_default().push(stub.record_number);
                    parents.insert(stub.record_number, base.record_number);
                },
                Some(base) => {
                    warn!("Entry #{} claims base #{} with sequence {}, but the base has sequence {}; treating it as independent",
                        stub.record_number, stub.base_record_ref, stub.base_record_seq, base.sequence_number);
                },
                None => {
                    warn!("Entry #{} claims base #{} which is empty or outside the image; treating it as independent",
                        stub.record_number, stub.base_record_ref);
                }
            }
        }

        StubMap { stubs, empty, children, parents }
    }

    pub fn total_slots(&self) -> u64 {
        self.stubs.len() as u64
    }

    pub fn empty_count(&self) -> u64 {
        self.empty.len() as u64
    }

    pub fn valid_count(&self) -> u64 {
        self.total_slots() - self.empty_count()
    }

    pub fn child_count(&self) -> u64 {
        self.parents.len() as u64
    }

    /// Number of independently addressable logical entries
    pub fn logical_count(&self) -> u64 {
        self.valid_count() - self.child_count()
    }

    pub fn stub(&self, number : u64) -> Option<&EntryStub> {
        self.stubs.get(number as usize).and_then(|stub| stub.as_ref())
    }

    pub fn is_empty_slot(&self, number : u64) -> bool {
        self.empty.contains(&number)
    }

    pub fn parent_of(&self, number : u64) -> Option<u64> {
        self.parents.get(&number).copied()
    }

    /// Children of a base entry, ascending by record number
    pub fn children_of(&self, number : u64) -> &[u64] {
        self.children.get(&number).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// True when the slot is neither empty nor a child fragment
    pub fn is_addressable(&self, number : u64) -> bool {
        number < self.total_slots() && !self.is_empty_slot(number) && self.parent_of(number).is_none()
    }
}

/// One sequential pass over every slot of the image, reading only the stub prefix of each.
pub fn scan_stubs<R : Read + Seek>(reader : &mut R, entry_size : u64) -> Result<StubMap> {
    let image_length = reader.seek(SeekFrom::End(0))?;
    let slot_count = image_length / entry_size;
    let stub_length = STUB_LENGTH.min(entry_size as usize);

    let mut stubs = Vec::with_capacity(slot_count as usize);
    let mut buffer = vec![0u8; stub_length];

    for slot in 0..slot_count {
        reader.seek(SeekFrom::Start(slot * entry_size))?;
        reader.read_exact(&mut buffer)?;

        if buffer[0..4] == [0, 0, 0, 0] {
            trace!("Slot #{} is empty", slot);
            stubs.push(None);
        } else {
            stubs.push(Some(EntryStub::parse(&buffer, slot)?));
        }
    }

    reader.seek(SeekFrom::Start(0))?;

    let map = StubMap::from_stubs(stubs);
    debug!("Scanned {} slots: {} empty, {} child entries, {} logical entries",
        map.total_slots(), map.empty_count(), map.child_count(), map.logical_count());

    Ok(map)
}
