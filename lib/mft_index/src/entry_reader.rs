use log::{debug, trace};
use std::io::{Read, Seek, SeekFrom};

use crate::config::MftConfig;
use crate::error::{MftError, Result};
use crate::mft_parser::*;
use crate::stub_scanner::StubMap;

/// Reads physical records out of an image and assembles them into logical entries
pub struct EntryReader<'a> {
    entry_size : u64,
    config : &'a MftConfig,
}

impl<'a> EntryReader<'a> {
    pub fn new(entry_size : u64, config : &'a MftConfig) -> Self {
        EntryReader { entry_size, config }
    }

    /// The untouched bytes of slot `record_number`, fix-up not applied
    pub fn read_raw<R : Read + Seek>(&self, reader : &mut R, record_number : u64) -> Result<Vec<u8>> {
        let offset = record_number.checked_mul(self.entry_size).ok_or_else(|| MftError::Entry {
            entry: record_number,
            reason: "record offset overflows".to_owned()
        })?;

        let mut buffer = vec![0u8; self.entry_size as usize];
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut buffer).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => MftError::Entry {
                entry: record_number,
                reason: format!("slot at offset {:#x} runs past the end of the image", offset)
            },
            _ => MftError::Io(e)
        })?;

        Ok(buffer)
    }

    /// One physical record on its own, children not merged
    pub fn read_physical<R : Read + Seek>(&self, reader : &mut R, record_number : u64) -> Result<LogicalEntry> {
        let buffer = self.read_raw(reader, record_number)?;
        trace!("Parsing physical record #{}", record_number);
        parse_record(buffer, record_number, self.config)
    }

    /// A base record with all of its children folded in, in ascending record order
    pub fn read_logical<R : Read + Seek>(&self, reader : &mut R, stub_map : &StubMap, record_number : u64) -> Result<LogicalEntry> {
        if record_number >= stub_map.total_slots() {
            return Err(MftError::Entry {
                entry: record_number,
                reason: format!("record number is past the last slot {}", stub_map.total_slots().saturating_sub(1))
            });
        }

        if stub_map.is_empty_slot(record_number) {
            return Err(MftError::EntryIsEmpty(record_number));
        }

        if let Some(parent) = stub_map.parent_of(record_number) {
            return Err(MftError::EntryIsChild { entry: record_number, parent });
        }

        let mut entry = self.read_physical(reader, record_number)?;

        let children = stub_map.children_of(record_number);
        if !children.is_empty() {
            debug!("Entry #{}: merging child records {:?}", record_number, children);
        }

        for child_number in children {
            let child = self.read_physical(reader, *child_number)?;
            merge_entries(&mut entry, child)?;
        }

        entry.finalize();
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeType;
    use crate::common::*;
    use crate::data_run::DataRun;
    use crate::stub_scanner::scan_stubs;
    use crate::test_image::*;
    use std::io::Cursor;

    fn fragmented_image() -> Vec<u8> {
        // Entry 1's DATA is split across itself and two children, children listed out of VCN order
        build_image(1024, vec![
            Some(RecordBuilder::new(0, 1024).build()),
            Some(RecordBuilder::new(1, 1024)
                .resident(ATTR_FILE_NAME, "", &file_name_value(5, 5, "big.bin", 1))
                .non_resident(ATTR_DATA, "", 0, 9, 0x10000, 0xF000, &[0x11, 0x0A, 0x10])
                .build()),
            Some(RecordBuilder::new(2, 1024).base(1, 1)
                .non_resident(ATTR_DATA, "", 20, 29, 0, 0, &[0x11, 0x0A, 0x50])
                .build()),
            None,
            Some(RecordBuilder::new(4, 1024).base(1, 1)
                .non_resident(ATTR_DATA, "", 10, 19, 0, 0, &[0x11, 0x0A, 0x30])
                .build()),
        ])
    }

    #[test]
    fn test_read_logical_merges_children() {
        let config = MftConfig::default();
        let mut cursor = Cursor::new(fragmented_image());
        let stub_map = scan_stubs(&mut cursor, 1024).unwrap();
        let reader = EntryReader::new(1024, &config);

        let entry = reader.read_logical(&mut cursor, &stub_map, 1).unwrap();
        assert_eq!(entry.record_numbers(), &[1, 2, 4]);

        let stream = entry.default_stream().unwrap();
        assert_eq!(stream.get_dataruns().unwrap(), vec![
            DataRun { length: 10, lcn: Some(0x10) },
            DataRun { length: 10, lcn: Some(0x30) },
            DataRun { length: 10, lcn: Some(0x50) },
        ]);
        assert_eq!(stream.size(), Some(0xF000));
        assert_eq!(stream.cluster_count(), 30);
        assert_eq!(entry.attributes(AttributeType::FileName).len(), 1);
    }

    #[test]
    fn test_read_logical_guards() {
        let config = MftConfig::default();
        let mut cursor = Cursor::new(fragmented_image());
        let stub_map = scan_stubs(&mut cursor, 1024).unwrap();
        let reader = EntryReader::new(1024, &config);

        assert!(matches!(reader.read_logical(&mut cursor, &stub_map, 3), Err(MftError::EntryIsEmpty(3))));
        assert!(matches!(reader.read_logical(&mut cursor, &stub_map, 4), Err(MftError::EntryIsChild { entry: 4, parent: 1 })));
        assert!(matches!(reader.read_logical(&mut cursor, &stub_map, 5), Err(MftError::Entry { entry: 5, .. })));
    }

    #[test]
    fn test_read_physical_ignores_relations() {
        let config = MftConfig::default();
        let mut cursor = Cursor::new(fragmented_image());
        let reader = EntryReader::new(1024, &config);

        let child = reader.read_physical(&mut cursor, 4).unwrap();
        assert_eq!(child.header.base_record_ref, 1);
        assert_eq!(child.record_numbers(), &[4]);
    }

    #[test]
    fn test_read_raw_is_not_fixed_up() {
        let config = MftConfig::default();
        let image = fragmented_image();
        let mut cursor = Cursor::new(image.clone());
        let reader = EntryReader::new(1024, &config);

        let raw = reader.read_raw(&mut cursor, 1).unwrap();
        assert_eq!(&raw[..], &image[1024..2048]);
        assert_eq!(&raw[510..512], &[0x01, 0x00]);

        assert!(matches!(reader.read_raw(&mut cursor, 5), Err(MftError::Entry { entry: 5, .. })));
    }
}
