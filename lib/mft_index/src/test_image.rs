// Builders for synthetic FILE records and MFT images used across the unit tests

use byteorder::*;

use crate::common::*;

const TEST_USN : u16 = 0x0001;

fn utf16(name : &str) -> Vec<u8> {
    name.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn align8(length : usize) -> usize {
    (length + 7) & !7
}

/// A resident attribute record with the name right after the header and the value after the name
pub fn resident_attribute(type_code : u32, name : &str, content : &[u8]) -> Vec<u8> {
    let name_bytes = utf16(name);
    let content_offset = align8(ARH_RES_LENGTH + name_bytes.len());
    let length = align8(content_offset + content.len());

    let mut attr = vec![0u8; length];
    LittleEndian::write_u32(&mut attr[ARH_TYPE_CODE_OFFSET..], type_code);
    LittleEndian::write_u32(&mut attr[ARH_RECORD_LENGTH_OFFSET..], length as u32);
    attr[ARH_FORM_CODE_OFFSET] = FORM_CODE_RESIDENT;
    attr[ARH_NAME_LENGTH_OFFSET] = (name_bytes.len() / 2) as u8;
    LittleEndian::write_u16(&mut attr[ARH_NAME_OFFSET_OFFSET..], ARH_RES_LENGTH as u16);
    LittleEndian::write_u32(&mut attr[ARH_RES_VALUE_LENGTH_OFFSET..], content.len() as u32);
    LittleEndian::write_u16(&mut attr[ARH_RES_VALUE_OFFSET_OFFSET..], content_offset as u16);

    attr[ARH_RES_LENGTH..ARH_RES_LENGTH + name_bytes.len()].copy_from_slice(&name_bytes);
    attr[content_offset..content_offset + content.len()].copy_from_slice(content);
    attr
}

/// A non-resident attribute record. The mapping pairs get their terminating zero appended.
pub fn non_resident_attribute(type_code : u32, name : &str, start_vcn : u64, last_vcn : u64, alloc_size : u64, data_size : u64, mapping_pairs : &[u8]) -> Vec<u8> {
    let name_bytes = utf16(name);
    let pairs_offset = align8(ARH_NONRES_LENGTH + name_bytes.len());
    let length = align8(pairs_offset + mapping_pairs.len() + 1);

    let mut attr = vec![0u8; length];
    LittleEndian::write_u32(&mut attr[ARH_TYPE_CODE_OFFSET..], type_code);
    LittleEndian::write_u32(&mut attr[ARH_RECORD_LENGTH_OFFSET..], length as u32);
    attr[ARH_FORM_CODE_OFFSET] = FORM_CODE_NONRESIDENT;
    attr[ARH_NAME_LENGTH_OFFSET] = (name_bytes.len() / 2) as u8;
    LittleEndian::write_u16(&mut attr[ARH_NAME_OFFSET_OFFSET..], ARH_NONRES_LENGTH as u16);
    LittleEndian::write_u64(&mut attr[ARH_NONRES_LOWEST_VCN_OFFSET..], start_vcn);
    LittleEndian::write_u64(&mut attr[ARH_NONRES_HIGHEST_VCN_OFFSET..], last_vcn);
    LittleEndian::write_u16(&mut attr[ARH_NONRES_MAPPING_PAIRS_OFFSET_OFFSET..], pairs_offset as u16);
    LittleEndian::write_u64(&mut attr[ARH_NONRES_ALLOCATED_LENGTH_OFFSET..], alloc_size);
    LittleEndian::write_u64(&mut attr[ARH_NONRES_FILE_SIZE_OFFSET..], data_size);
    LittleEndian::write_u64(&mut attr[ARH_NONRES_VALID_DATA_LENGTH_OFFSET..], data_size);

    attr[ARH_NONRES_LENGTH..ARH_NONRES_LENGTH + name_bytes.len()].copy_from_slice(&name_bytes);
    attr[pairs_offset..pairs_offset + mapping_pairs.len()].copy_from_slice(mapping_pairs);
    attr
}

/// A $FILE_NAME value with zeroed timestamps and sizes
pub fn file_name_value(parent_record : u64, parent_sequence : u16, name : &str, namespace : u8) -> Vec<u8> {
    let name_bytes = utf16(name);
    let mut value = vec![0u8; 0x42];
    LittleEndian::write_u48(&mut value[0x00..], parent_record);
    LittleEndian::write_u16(&mut value[0x06..], parent_sequence);
    value[0x40] = (name_bytes.len() / 2) as u8;
    value[0x41] = namespace;
    value.extend_from_slice(&name_bytes);
    value
}

/// One $ATTRIBUTE_LIST row, name at 0x1A
pub fn attribute_list_row(type_code : u32, start_vcn : u64, segment_record : u64, segment_sequence : u16, name : &str) -> Vec<u8> {
    let name_bytes = utf16(name);
    let length = align8(0x1A + name_bytes.len());

    let mut row = vec![0u8; length];
    LittleEndian::write_u32(&mut row[0x00..], type_code);
    LittleEndian::write_u16(&mut row[0x04..], length as u16);
    row[0x06] = (name_bytes.len() / 2) as u8;
    row[0x07] = 0x1A;
    LittleEndian::write_u64(&mut row[0x08..], start_vcn);
    LittleEndian::write_u48(&mut row[0x10..], segment_record);
    LittleEndian::write_u16(&mut row[0x16..], segment_sequence);
    row[0x1A..0x1A + name_bytes.len()].copy_from_slice(&name_bytes);
    row
}

/// Builds a FILE record of a given size, protected with an update sequence array
pub struct RecordBuilder {
    number : u64,
    size : usize,
    sequence : u16,
    flags : u16,
    base_record_ref : u64,
    base_record_seq : u16,
    attributes : Vec<Vec<u8>>,
}

impl RecordBuilder {
    pub fn new(number : u64, size : usize) -> Self {
        RecordBuilder {
            number,
            size,
            sequence: 1,
            flags: FILE_RECORD_FLAG_IN_USE,
            base_record_ref: 0,
            base_record_seq: 0,
            attributes: vec!(),
        }
    }

    pub fn sequence(mut self, sequence : u16) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn flags(mut self, flags : u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn base(mut self, base_record_ref : u64, base_record_seq : u16) -> Self {
        self.base_record_ref = base_record_ref;
        self.base_record_seq = base_record_seq;
        self
    }

    pub fn attribute(mut self, attribute : Vec<u8>) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn resident(self, type_code : u32, name : &str, content : &[u8]) -> Self {
        self.attribute(resident_attribute(type_code, name, content))
    }

    pub fn non_resident(self, type_code : u32, name : &str, start_vcn : u64, last_vcn : u64, alloc_size : u64, data_size : u64, mapping_pairs : &[u8]) -> Self {
        self.attribute(non_resident_attribute(type_code, name, start_vcn, last_vcn, alloc_size, data_size, mapping_pairs))
    }

    fn fixup_count(&self) -> usize {
        self.size / FIXUP_SECTOR_SIZE + 1
    }

    fn first_attribute_offset(&self) -> usize {
        align8(FRSH_LENGTH + self.fixup_count() * 2)
    }

    /// Where the next attribute added would start
    pub fn next_attribute_offset(&self) -> usize {
        self.first_attribute_offset() + self.attributes.iter().map(|a| a.len()).sum::<usize>()
    }

    pub fn build(self) -> Vec<u8> {
        let mut record = vec![0u8; self.size];
        let fixup_count = self.fixup_count();
        let first_attribute_offset = self.first_attribute_offset();

        record[0..4].copy_from_slice(b"FILE");
        LittleEndian::write_u16(&mut record[FRSH_FIXUP_ARRAY_OFFSET..], FRSH_LENGTH as u16);
        LittleEndian::write_u16(&mut record[FRSH_FIXUP_ARRAY_COUNT..], fixup_count as u16);
        LittleEndian::write_u16(&mut record[FRSH_SEQUENCE_NUMBER_OFFSET..], self.sequence);
        LittleEndian::write_u16(&mut record[FRSH_HARD_LINK_COUNT_OFFSET..], 1);
        LittleEndian::write_u16(&mut record[FRSH_FIRST_ATTRIBUTE_OFFSET..], first_attribute_offset as u16);
        LittleEndian::write_u16(&mut record[FRSH_FLAGS_OFFSET..], self.flags);
        LittleEndian::write_u32(&mut record[FRSH_ALLOCATED_SIZE_OFFSET..], self.size as u32);
        LittleEndian::write_u48(&mut record[FRSH_BASE_RECORD_OFFSET..], self.base_record_ref);
        LittleEndian::write_u16(&mut record[FRSH_BASE_RECORD_SEQUENCE_OFFSET..], self.base_record_seq);
        LittleEndian::write_u32(&mut record[FRSH_RECORD_NUMBER_OFFSET..], self.number as u32);

        let mut offset = first_attribute_offset;
        for attribute in &self.attributes {
            record[offset..offset + attribute.len()].copy_from_slice(attribute);
            offset += attribute.len();
        }

        if offset + 4 <= record.len() {
            LittleEndian::write_u32(&mut record[offset..], ATTR_END_MARKER);
            offset += 8;
        }
        LittleEndian::write_u32(&mut record[FRSH_USED_SIZE_OFFSET..], offset.min(self.size) as u32);

        // Protect the record: save each sector's last two bytes and stamp the USN in their place
        LittleEndian::write_u16(&mut record[FRSH_LENGTH..], TEST_USN);
        for sector in 1..fixup_count {
            let sector_end = sector * FIXUP_SECTOR_SIZE - 2;
            let saved = [record[sector_end], record[sector_end + 1]];
            record[FRSH_LENGTH + sector * 2..FRSH_LENGTH + sector * 2 + 2].copy_from_slice(&saved);
            LittleEndian::write_u16(&mut record[sector_end..], TEST_USN);
        }

        record
    }
}

/// Concatenates records into an image. `None` slots are left zeroed.
pub fn build_image(entry_size : usize, records : Vec<Option<Vec<u8>>>) -> Vec<u8> {
    let mut image = vec!();
    for record in records {
        match record {
            Some(record) => {
                assert_eq!(record.len(), entry_size);
                image.extend_from_slice(&record);
            },
            None => image.extend(std::iter::repeat(0u8).take(entry_size)),
        }
    }
    image
}
