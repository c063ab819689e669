use byteorder::*;
use log::{trace, warn};
use std::collections::BTreeMap;

use crate::attribute::*;
use crate::common::*;
use crate::config::MftConfig;
use crate::datastream::Datastream;
use crate::entry_size::is_valid_signature;
use crate::error::{MftError, Result};
use crate::mft_types::*;
use crate::slice_utils::*;

/// The fixed FILE record header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Slot number the record was read from
    pub record_number : u64,
    pub signature : u32,
    pub fixup_offset : u16,
    pub fixup_count : u16,
    pub logfile_sequence_number : u64,
    pub sequence_number : u16,
    pub hard_link_count : u16,
    pub first_attribute_offset : u16,
    pub flags : u16,
    pub used_size : u32,
    pub allocated_size : u32,
    pub base_record_ref : u64,
    pub base_record_seq : u16,
    pub next_attribute_id : u16,
    /// Record number as stored in the header itself (XP and later)
    pub declared_record_number : u32,
    pub fixup_okay : bool,
}

impl EntryHeader {
    const MR_SIGNATURE : MftDataField<u32> = MftDataField::<u32>::new("Signature", FRSH_SIGNATURE_OFFSET);
    const MR_FIXUP_ARRAY_OFFSET : MftDataField<u16> = MftDataField::<u16>::new("FixupArrayOffset", FRSH_FIXUP_ARRAY_OFFSET);
    const MR_FIXUP_ARRAY_SIZE : MftDataField<u16> = MftDataField::<u16>::new("FixupArraySize", FRSH_FIXUP_ARRAY_COUNT);
    const MR_LOGFILE_SEQUENCE_NUMBER : MftDataField<u64> = MftDataField::<u64>::new("LogFileSequenceNumber", FRSH_LOGFILE_SEQUENCE_NUMBER);
    const MR_SEQUENCE_NUMBER : MftDataField<u16> = MftDataField::<u16>::new("SequenceNumber", FRSH_SEQUENCE_NUMBER_OFFSET);
    const MR_HARD_LINK_COUNT : MftDataField<u16> = MftDataField::<u16>::new("HardLinkCount", FRSH_HARD_LINK_COUNT_OFFSET);
    const MR_FIRST_ATTRIBUTE_OFFSET : MftDataField<u16> = MftDataField::<u16>::new("FirstAttributeOffset", FRSH_FIRST_ATTRIBUTE_OFFSET);
    const MR_FLAGS : MftDataField<u16> = MftDataField::<u16>::new("Flags", FRSH_FLAGS_OFFSET);
    const MR_USED_SIZE : MftDataField<u32> = MftDataField::<u32>::new("UsedSize", FRSH_USED_SIZE_OFFSET);
    const MR_ALLOCATED_SIZE : MftDataField<u32> = MftDataField::<u32>::new("AllocatedSize", FRSH_ALLOCATED_SIZE_OFFSET);
    const MR_BASE_RECORD_ADDRESS : MftDataField<u48> = MftDataField::<u48>::new("BaseRecordAddress", FRSH_BASE_RECORD_OFFSET);
    const MR_BASE_RECORD_SEQ_ID : MftDataField<u16> = MftDataField::<u16>::new("BaseRecordSequenceId", FRSH_BASE_RECORD_SEQUENCE_OFFSET);
    const MR_NEXT_ATTRIBUTE_ID : MftDataField<u16> = MftDataField::<u16>::new("NextAttributeId", FRSH_NEXT_ATTRIBUTE_ID_OFFSET);
    const MR_RECORD_ID : MftDataField<u32> = MftDataField::<u32>::new("MftRecordId", FRSH_RECORD_NUMBER_OFFSET);

    pub fn parse(record : &[u8], record_number : u64) -> Result<Self> {
        if record.len() < FRSH_LENGTH {
            return Err(MftError::Header {
                entry: record_number,
                reason: format!("record of {} bytes is shorter than the {} byte header", record.len(), FRSH_LENGTH),
                raw: record.to_vec()
            });
        }

        // Every field lies inside FRSH_LENGTH, so the reads below can't come back empty
        let header = &record[..FRSH_LENGTH];

        Ok(EntryHeader {
            record_number,
            signature: Self::MR_SIGNATURE.read(header).unwrap_or_default(),
            fixup_offset: Self::MR_FIXUP_ARRAY_OFFSET.read(header).unwrap_or_default(),
            fixup_count: Self::MR_FIXUP_ARRAY_SIZE.read(header).unwrap_or_default(),
            logfile_sequence_number: Self::MR_LOGFILE_SEQUENCE_NUMBER.read(header).unwrap_or_default(),
            sequence_number: Self::MR_SEQUENCE_NUMBER.read(header).unwrap_or_default(),
            hard_link_count: Self::MR_HARD_LINK_COUNT.read(header).unwrap_or_default(),
            first_attribute_offset: Self::MR_FIRST_ATTRIBUTE_OFFSET.read(header).unwrap_or_default(),
            flags: Self::MR_FLAGS.read(header).unwrap_or_default(),
            used_size: Self::MR_USED_SIZE.read(header).unwrap_or_default(),
            allocated_size: Self::MR_ALLOCATED_SIZE.read(header).unwrap_or_default(),
            base_record_ref: Self::MR_BASE_RECORD_ADDRESS.read(header).map(u64::from).unwrap_or_default(),
            base_record_seq: Self::MR_BASE_RECORD_SEQ_ID.read(header).unwrap_or_default(),
            next_attribute_id: Self::MR_NEXT_ATTRIBUTE_ID.read(header).unwrap_or_default(),
            declared_record_number: Self::MR_RECORD_ID.read(header).unwrap_or_default(),
            fixup_okay: false,
        })
    }

    /// Header fields for display, with their byte ranges inside the record
    pub fn get_field_display_info(record : &[u8]) -> Vec<FieldDisplayInfo> {
        vec!(
            Self::MR_SIGNATURE.get_display_info(record),
            Self::MR_FIXUP_ARRAY_OFFSET.get_display_info(record),
            Self::MR_FIXUP_ARRAY_SIZE.get_display_info(record),
            Self::MR_LOGFILE_SEQUENCE_NUMBER.get_display_info(record),
            Self::MR_SEQUENCE_NUMBER.get_display_info(record),
            Self::MR_HARD_LINK_COUNT.get_display_info(record),
            Self::MR_FIRST_ATTRIBUTE_OFFSET.get_display_info(record),
            Self::MR_FLAGS.get_display_info(record),
            Self::MR_USED_SIZE.get_display_info(record),
            Self::MR_ALLOCATED_SIZE.get_display_info(record),
            Self::MR_BASE_RECORD_ADDRESS.get_display_info(record),
            Self::MR_BASE_RECORD_SEQ_ID.get_display_info(record),
            Self::MR_NEXT_ATTRIBUTE_ID.get_display_info(record),
            Self::MR_RECORD_ID.get_display_info(record),
        ).into_iter().flatten().collect()
    }

    pub fn has_valid_signature(&self) -> bool {
        is_valid_signature(self.signature)
    }

    pub fn is_in_use(&self) -> bool {
        self.flags & FILE_RECORD_FLAG_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FILE_RECORD_FLAG_DIRECTORY != 0
    }

    pub fn is_deleted(&self) -> bool {
        !self.is_in_use()
    }

    pub fn is_base_record(&self) -> bool {
        self.base_record_ref == 0
    }
}

/// Applies the update sequence array to a record in place.
///
/// Sectors whose tail doesn't carry the update sequence number are left alone and reported
/// through the return value. An array that doesn't fit the record is an error.
pub fn apply_fixup(record : &mut [u8], fixup_offset : u16, fixup_count : u16, record_number : u64) -> Result<bool> {
    let fixup_offset = fixup_offset as usize;
    let fixup_count = fixup_count as usize;

    if fixup_count == 0 || fixup_offset + fixup_count * 2 > record.len() {
        return Err(MftError::Entry {
            entry: record_number,
            reason: format!("fix-up array at {:#x} with {} elements doesn't fit a {} byte record", fixup_offset, fixup_count, record.len())
        });
    }

    if (fixup_count - 1) * FIXUP_SECTOR_SIZE > record.len() {
        return Err(MftError::Entry {
            entry: record_number,
            reason: format!("fix-up array covers {} sectors, the record only holds {}", fixup_count - 1, record.len() / FIXUP_SECTOR_SIZE)
        });
    }

    let expected_value = LittleEndian::read_u16(&record[fixup_offset..fixup_offset + 2]);
    let mut fixup_okay = true;

    for sector in 1..fixup_count {
        let sector_end = sector * FIXUP_SECTOR_SIZE - 2;
        let found = LittleEndian::read_u16(&record[sector_end..sector_end + 2]);

        if found != expected_value {
            warn!("BAD FIXUP #{} - sector {}: expected {:#06x}, got {:#06x}", record_number, sector, expected_value, found);
            fixup_okay = false;
            continue;
        }

        let replacement_offset = fixup_offset + sector * 2;
        let replacement = LittleEndian::read_u16(&record[replacement_offset..replacement_offset + 2]);
        LittleEndian::write_u16(&mut record[sector_end..sector_end + 2], replacement);
        trace!("Entry #{}: fixed sector {} with {:#06x}", record_number, sector, replacement);
    }

    Ok(fixup_okay)
}

/// A resident attribute value the type's decoder rejected. The walk carried on past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFault {
    pub entry : u64,
    pub offset : usize,
    pub attribute_type : AttributeType,
    pub reason : String,
}

/// One logical file: its base record with every child record folded in
#[derive(Debug, Clone)]
pub struct LogicalEntry {
    pub header : EntryHeader,
    attributes : BTreeMap<AttributeType, Vec<Attribute>>,
    streams : BTreeMap<String, Datastream>,
    faults : Vec<AttributeFault>,
    record_numbers : Vec<u64>,
}

impl LogicalEntry {
    pub fn new(header : EntryHeader) -> Self {
        let record_numbers = vec!(header.record_number);
        LogicalEntry {
            header,
            attributes: BTreeMap::new(),
            streams: BTreeMap::new(),
            faults: vec!(),
            record_numbers,
        }
    }

    pub fn number(&self) -> u64 {
        self.header.record_number
    }

    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number
    }

    pub fn is_in_use(&self) -> bool { self.header.is_in_use() }
    pub fn is_directory(&self) -> bool { self.header.is_directory() }
    pub fn is_deleted(&self) -> bool { self.header.is_deleted() }

    /// Physical records this entry was assembled from, base first
    pub fn record_numbers(&self) -> &[u64] {
        &self.record_numbers
    }

    pub fn attribute_map(&self) -> &BTreeMap<AttributeType, Vec<Attribute>> {
        &self.attributes
    }

    /// Attributes of one type in on-disk order, base record first
    pub fn attributes(&self, attribute_type : AttributeType) -> &[Attribute] {
        self.attributes.get(&attribute_type).map(|a| a.as_slice()).unwrap_or(&[])
    }

    pub fn first_attribute(&self, attribute_type : AttributeType) -> Option<&Attribute> {
        self.attributes(attribute_type).first()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.values().map(|a| a.len()).sum()
    }

    pub fn standard_information(&self) -> Option<&StandardInformation> {
        self.attributes(AttributeType::StandardInformation).iter().find_map(|a| match &a.content {
            Some(AttributeContent::StandardInformation(info)) => Some(info),
            _ => None
        })
    }

    /// The first FILE_NAME that isn't a DOS 8.3 alias
    pub fn file_name(&self) -> Option<&FileNameInfo> {
        self.attributes(AttributeType::FileName).iter()
            .filter_map(|a| match &a.content {
                Some(AttributeContent::FileName(info)) => Some(info),
                _ => None
            })
            .find(|info| !info.is_dos_name())
    }

    pub fn streams(&self) -> impl Iterator<Item = &Datastream> {
        self.streams.values()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn data_stream(&self, name : &str) -> Option<&Datastream> {
        self.streams.get(name)
    }

    pub fn default_stream(&self) -> Option<&Datastream> {
        self.data_stream("")
    }

    pub fn faults(&self) -> &[AttributeFault] {
        &self.faults
    }

    pub fn push_attribute(&mut self, attribute : Attribute) {
        self.attributes.entry(attribute.attribute_type()).or_default().push(attribute);
    }

    pub fn add_data_attribute(&mut self, attribute : &Attribute) -> Result<()> {
        self.streams.entry(attribute.name().to_owned())
            .or_insert_with(|| Datastream::new(attribute.name()))
            .add_fragment(attribute)
    }

    /// Sorts every stream's fragments, once all records have been merged
    pub fn finalize(&mut self) {
        for stream in self.streams.values_mut() {
            stream.sort_fragments();
        }
    }
}

/// Folds a child record into its base entry. Child attributes go after the base's own,
/// child streams merge into same-named base streams or are adopted as new ones.
pub fn merge_entries(base : &mut LogicalEntry, child : LogicalEntry) -> Result<()> {
    for (attribute_type, attributes) in child.attributes {
        base.attributes.entry(attribute_type).or_default().extend(attributes);
    }

    for (name, stream) in child.streams {
        match base.streams.get_mut(&name) {
            Some(existing) => existing.merge_from(stream)?,
            None => {
                base.streams.insert(name, stream);
            }
        }
    }

    base.faults.extend(child.faults);
    base.record_numbers.extend(child.record_numbers);

    Ok(())
}

/// Parses one physical record buffer into an entry
pub fn parse_record(mut record : Vec<u8>, record_number : u64, config : &MftConfig) -> Result<LogicalEntry> {
    let mut header = EntryHeader::parse(&record, record_number)?;

    if !header.has_valid_signature() {
        if config.ignore_signature_check {
            warn!("Entry #{} has signature {:#010x}, parsing it anyway", record_number, header.signature);
        } else {
            return Err(MftError::Header {
                entry: record_number,
                reason: format!("invalid signature {:#010x}", header.signature),
                raw: record[..FRSH_LENGTH].to_vec()
            });
        }
    }

    if header.declared_record_number as u64 != record_number & 0xffff_ffff {
        warn!("Entry #{} declares record number {}", record_number, header.declared_record_number);
    }

    if header.allocated_size as usize != record.len() {
        return Err(MftError::Entry {
            entry: record_number,
            reason: format!("declared allocated size {} doesn't match the {} byte slot", header.allocated_size, record.len())
        });
    }

    if config.apply_fixup_array {
        header.fixup_okay = apply_fixup(&mut record, header.fixup_offset, header.fixup_count, record_number)?;
    }

    let first_attribute_offset = header.first_attribute_offset as usize;
    if first_attribute_offset < FRSH_LENGTH || first_attribute_offset > record.len() {
        return Err(MftError::Header {
            entry: record_number,
            reason: format!("first attribute offset {:#x} is outside the record", first_attribute_offset),
            raw: record[..FRSH_LENGTH].to_vec()
        });
    }

    let mut entry = LogicalEntry::new(header);
    let mut attribute_offset = first_attribute_offset;

    while attribute_offset + 4 <= record.len() {
        let attribute_type_code = LittleEndian::read_u32(&record[attribute_offset..attribute_offset + 4]);
        if attribute_type_code == ATTR_END_MARKER {
            break;
        }

        match decode_attribute(&record, attribute_offset, record_number, &config.load_flags)? {
            DecodedAttribute::Skipped { length, .. } => {
                attribute_offset += length;
            },
            DecodedAttribute::Parsed { attribute, length, fault } => {
                if let Some(reason) = fault {
                    warn!("Entry #{}: could not decode {} at offset {:#x}: {}", record_number, attribute.attribute_type(), attribute_offset, reason);
                    entry.faults.push(AttributeFault { entry: record_number, offset: attribute_offset, attribute_type: attribute.attribute_type(), reason });
                }

                if attribute.attribute_type() == AttributeType::Data {
                    entry.add_data_attribute(&attribute)?;
                } else {
                    entry.push_attribute(attribute);
                }

                attribute_offset += length;
            }
        }
    }

    Ok(entry)
}
