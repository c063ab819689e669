use log::trace;
use std::fmt;
use std::str::FromStr;

use crate::common::*;
use crate::config::AttributeLoadFlags;
use crate::data_run::*;
use crate::error::{MftError, Result};
use crate::mft_types::*;
use crate::slice_utils::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeType {
    StandardInformation,
    AttributeList,
    FileName,
    ObjectId,
    SecurityDescriptor,
    VolumeName,
    VolumeInformation,
    Data,
    IndexRoot,
    IndexAllocation,
    Bitmap,
    ReparsePoint,
    EaInformation,
    Ea,
    PropertySet,
    LoggedUtilityStream,
    Unknown(u32),
}

impl AttributeType {
    pub const KNOWN : [AttributeType; 16] = [
        AttributeType::StandardInformation,
        AttributeType::AttributeList,
        AttributeType::FileName,
        AttributeType::ObjectId,
        AttributeType::SecurityDescriptor,
        AttributeType::VolumeName,
        AttributeType::VolumeInformation,
        AttributeType::Data,
        AttributeType::IndexRoot,
        AttributeType::IndexAllocation,
        AttributeType::Bitmap,
        AttributeType::ReparsePoint,
        AttributeType::EaInformation,
        AttributeType::Ea,
        AttributeType::PropertySet,
        AttributeType::LoggedUtilityStream,
    ];

    pub fn from_code(code : u32) -> Self {
        match code {
            ATTR_STANDARD_INFORMATION => AttributeType::StandardInformation,
            ATTR_ATTRIBUTE_LIST => AttributeType::AttributeList,
            ATTR_FILE_NAME => AttributeType::FileName,
            ATTR_OBJECT_ID => AttributeType::ObjectId,
            ATTR_SECURITY_DESCRIPTOR => AttributeType::SecurityDescriptor,
            ATTR_VOLUME_NAME => AttributeType::VolumeName,
            ATTR_VOLUME_INFORMATION => AttributeType::VolumeInformation,
            ATTR_DATA => AttributeType::Data,
            ATTR_INDEX_ROOT => AttributeType::IndexRoot,
            ATTR_INDEX_ALLOCATION => AttributeType::IndexAllocation,
            ATTR_BITMAP => AttributeType::Bitmap,
            ATTR_REPARSE_POINT => AttributeType::ReparsePoint,
            ATTR_EA_INFORMATION => AttributeType::EaInformation,
            ATTR_EA => AttributeType::Ea,
            ATTR_PROPERTY_SET => AttributeType::PropertySet,
            ATTR_LOGGED_UTILITY_STREAM => AttributeType::LoggedUtilityStream,
            other => AttributeType::Unknown(other)
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            AttributeType::StandardInformation => ATTR_STANDARD_INFORMATION,
            AttributeType::AttributeList => ATTR_ATTRIBUTE_LIST,
            AttributeType::FileName => ATTR_FILE_NAME,
            AttributeType::ObjectId => ATTR_OBJECT_ID,
            AttributeType::SecurityDescriptor => ATTR_SECURITY_DESCRIPTOR,
            AttributeType::VolumeName => ATTR_VOLUME_NAME,
            AttributeType::VolumeInformation => ATTR_VOLUME_INFORMATION,
            AttributeType::Data => ATTR_DATA,
            AttributeType::IndexRoot => ATTR_INDEX_ROOT,
            AttributeType::IndexAllocation => ATTR_INDEX_ALLOCATION,
            AttributeType::Bitmap => ATTR_BITMAP,
            AttributeType::ReparsePoint => ATTR_REPARSE_POINT,
            AttributeType::EaInformation => ATTR_EA_INFORMATION,
            AttributeType::Ea => ATTR_EA,
            AttributeType::PropertySet => ATTR_PROPERTY_SET,
            AttributeType::LoggedUtilityStream => ATTR_LOGGED_UTILITY_STREAM,
            AttributeType::Unknown(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::StandardInformation => "$STANDARD_INFORMATION",
            AttributeType::AttributeList => "$ATTRIBUTE_LIST",
            AttributeType::FileName => "$FILE_NAME",
            AttributeType::ObjectId => "$OBJECT_ID",
            AttributeType::SecurityDescriptor => "$SECURITY_DESCRIPTOR",
            AttributeType::VolumeName => "$VOLUME_NAME",
            AttributeType::VolumeInformation => "$VOLUME_INFORMATION",
            AttributeType::Data => "$DATA",
            AttributeType::IndexRoot => "$INDEX_ROOT",
            AttributeType::IndexAllocation => "$INDEX_ALLOCATION",
            AttributeType::Bitmap => "$BITMAP",
            AttributeType::ReparsePoint => "$REPARSE_POINT",
            AttributeType::EaInformation => "$EA_INFORMATION",
            AttributeType::Ea => "$EA",
            AttributeType::PropertySet => "$PROPERTY_SET",
            AttributeType::LoggedUtilityStream => "$LOGGED_UTILITY_STREAM",
            AttributeType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x})", self.name(), self.code())
    }
}

/// Accepts "$DATA", "data", "0x80" or "128"
impl FromStr for AttributeType {
    type Err = String;

    fn from_str(s : &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();

        let code = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            trimmed.parse::<u32>().ok()
        };

        if let Some(code) = code {
            return Ok(AttributeType::from_code(code));
        }

        let wanted = trimmed.trim_start_matches('$').to_ascii_uppercase();
        AttributeType::KNOWN.iter()
            .find(|t| t.name().trim_start_matches('$') == wanted)
            .copied()
            .ok_or_else(|| format!("Unknown attribute type '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentHeader {
    pub content_length : u32,
    pub content_offset : u16,
    pub indexed : bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonResidentHeader {
    pub start_vcn : u64,
    pub last_vcn : u64,
    pub mapping_pairs_offset : u16,
    pub compression_unit : u16,
    pub alloc_size : u64,
    pub data_size : u64,
    pub initialized_size : u64,
    pub data_runs : Vec<DataRun>,
}

impl NonResidentHeader {
    /// First VCN past this fragment. An empty stream stores a last VCN of -1, which wraps to 0 here.
    pub fn end_vcn(&self) -> u64 {
        self.last_vcn.wrapping_add(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeForm {
    Resident(ResidentHeader),
    NonResident(NonResidentHeader),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeHeader {
    pub attribute_type : AttributeType,
    pub record_length : u32,
    pub name : String,
    pub flags : u16,
    pub id : u16,
    pub form : AttributeForm,
}

impl AttributeHeader {
    pub const FLAG_COMPRESSED : u16 = 0x0001;
    pub const FLAG_ENCRYPTED : u16 = 0x4000;
    pub const FLAG_SPARSE : u16 = 0x8000;

    const AH_TYPE_CODE : MftDataField<u32> = MftDataField::<u32>::new("TypeCode", ARH_TYPE_CODE_OFFSET);
    const AH_RECORD_LENGTH : MftDataField<u32> = MftDataField::<u32>::new("RecordLength", ARH_RECORD_LENGTH_OFFSET);
    const AH_FORM_CODE : MftDataField<u8> = MftDataField::<u8>::new("FormCode", ARH_FORM_CODE_OFFSET);
    const AH_NAME_LENGTH : MftDataField<u8> = MftDataField::<u8>::new("NameLength", ARH_NAME_LENGTH_OFFSET);
    const AH_NAME_OFFSET : MftDataField<u16> = MftDataField::<u16>::new("NameOffset", ARH_NAME_OFFSET_OFFSET);
    const AH_FLAGS : MftDataField<u16> = MftDataField::<u16>::new("Flags", ARH_FLAGS_OFFSET);
    const AH_INSTANCE : MftDataField<u16> = MftDataField::<u16>::new("Instance", ARH_INSTANCE_OFFSET);

    const AH_RES_VALUE_LENGTH : MftDataField<u32> = MftDataField::<u32>::new("ValueLength", ARH_RES_VALUE_LENGTH_OFFSET);
    const AH_RES_VALUE_OFFSET : MftDataField<u16> = MftDataField::<u16>::new("ValueOffset", ARH_RES_VALUE_OFFSET_OFFSET);
    const AH_RES_INDEXED_FLAG : MftDataField<u8> = MftDataField::<u8>::new("IndexedFlag", ARH_RES_INDEXED_FLAG_OFFSET);

    const AH_NONRES_LOWEST_VCN : MftDataField<u64> = MftDataField::<u64>::new("LowestVcn", ARH_NONRES_LOWEST_VCN_OFFSET);
    const AH_NONRES_HIGHEST_VCN : MftDataField<u64> = MftDataField::<u64>::new("HighestVcn", ARH_NONRES_HIGHEST_VCN_OFFSET);
    const AH_NONRES_MAPPING_PAIRS_OFFSET : MftDataField<u16> = MftDataField::<u16>::new("MappingPairsOffset", ARH_NONRES_MAPPING_PAIRS_OFFSET_OFFSET);
    const AH_NONRES_COMPRESSION_UNIT : MftDataField<u16> = MftDataField::<u16>::new("CompressionUnit", ARH_NONRES_COMPRESSION_UNIT_OFFSET);
    const AH_NONRES_ALLOCATED_LENGTH : MftDataField<u64> = MftDataField::<u64>::new("AllocatedLength", ARH_NONRES_ALLOCATED_LENGTH_OFFSET);
    const AH_NONRES_FILE_SIZE : MftDataField<u64> = MftDataField::<u64>::new("FileSize", ARH_NONRES_FILE_SIZE_OFFSET);
    const AH_NONRES_VALID_DATA_LENGTH : MftDataField<u64> = MftDataField::<u64>::new("ValidDataLength", ARH_NONRES_VALID_DATA_LENGTH_OFFSET);

    pub fn is_resident(&self) -> bool {
        matches!(self.form, AttributeForm::Resident(_))
    }

    pub fn non_resident(&self) -> Option<&NonResidentHeader> {
        match &self.form {
            AttributeForm::NonResident(header) => Some(header),
            AttributeForm::Resident(_) => None
        }
    }

    pub fn is_compressed(&self) -> bool { self.flags & Self::FLAG_COMPRESSED != 0 }
    pub fn is_encrypted(&self) -> bool { self.flags & Self::FLAG_ENCRYPTED != 0 }
    pub fn is_sparse(&self) -> bool { self.flags & Self::FLAG_SPARSE != 0 }

    /// Header fields present in `slice` (which starts at the attribute), for display
    pub fn get_field_display_info(slice : &[u8]) -> Vec<FieldDisplayInfo> {
        let mut fields : Vec<Option<FieldDisplayInfo>> = vec!(
            Self::AH_TYPE_CODE.get_display_info(slice),
            Self::AH_RECORD_LENGTH.get_display_info(slice),
            Self::AH_FORM_CODE.get_display_info(slice),
            Self::AH_NAME_LENGTH.get_display_info(slice),
            Self::AH_NAME_OFFSET.get_display_info(slice),
            Self::AH_FLAGS.get_display_info(slice),
            Self::AH_INSTANCE.get_display_info(slice),
        );

        if Self::AH_FORM_CODE.read(slice) == Some(FORM_CODE_NONRESIDENT) {
            fields.extend([
                Self::AH_NONRES_LOWEST_VCN.get_display_info(slice),
                Self::AH_NONRES_HIGHEST_VCN.get_display_info(slice),
                Self::AH_NONRES_MAPPING_PAIRS_OFFSET.get_display_info(slice),
                Self::AH_NONRES_COMPRESSION_UNIT.get_display_info(slice),
                Self::AH_NONRES_ALLOCATED_LENGTH.get_display_info(slice),
                Self::AH_NONRES_FILE_SIZE.get_display_info(slice),
                Self::AH_NONRES_VALID_DATA_LENGTH.get_display_info(slice),
            ]);
        } else {
            fields.extend([
                Self::AH_RES_VALUE_LENGTH.get_display_info(slice),
                Self::AH_RES_VALUE_OFFSET.get_display_info(slice),
                Self::AH_RES_INDEXED_FLAG.get_display_info(slice),
            ]);
        }

        fields.into_iter().flatten().collect()
    }
}

/// One attribute of an entry. Only resident attributes carry content; non-resident ones
/// only carry their run descriptors in the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub header : AttributeHeader,
    pub content : Option<AttributeContent>,
    /// Physical record the attribute was read from, and its offset inside that record
    pub record_number : u64,
    pub offset : usize,
}

impl Attribute {
    pub fn attribute_type(&self) -> AttributeType {
        self.header.attribute_type
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn is_resident(&self) -> bool {
        self.header.is_resident()
    }

    /// This attribute's bytes inside the (fixed-up) buffer of the record it came from
    pub fn slice_in<'a>(&self, record : &'a [u8]) -> Option<&'a [u8]> {
        record.get(self.offset..self.offset + self.header.record_length as usize)
    }

    /// The undecoded bytes of an opaque or DATA resident attribute
    pub fn raw_content(&self) -> Option<&[u8]> {
        match &self.content {
            Some(AttributeContent::Raw(bytes)) => Some(bytes),
            _ => None
        }
    }
}

pub enum DecodedAttribute {
    /// The load configuration excludes this type; advance by `length`
    Skipped { attribute_type : AttributeType, length : usize },
    /// `fault` is set when the content decoder rejected a resident value
    Parsed { attribute : Attribute, length : usize, fault : Option<String> },
}

/// Decodes the attribute starting at `offset` in a (fixed-up) record buffer.
///
/// Structural problems that stop the walk from advancing safely are errors. A resident
/// value that the type's decoder can't make sense of is reported as a fault instead.
pub fn decode_attribute(record : &[u8], offset : usize, entry : u64, load_flags : &AttributeLoadFlags) -> Result<DecodedAttribute> {
    let basic = record.get(offset..offset + ARH_BASIC_LENGTH)
        .ok_or_else(|| attribute_error(entry, offset, AttributeType::Unknown(0), "basic header runs past the end of the record"))?;

    let attribute_type = AttributeType::from_code(AttributeHeader::AH_TYPE_CODE.read(basic).unwrap_or_default());
    let length = AttributeHeader::AH_RECORD_LENGTH.read(basic).unwrap_or_default() as usize;

    if length < ARH_COMMON_LENGTH || offset + length > record.len() {
        return Err(attribute_error(entry, offset, attribute_type, &format!("invalid attribute length {}", length)));
    }

    if !load_flags.is_enabled(attribute_type) {
        trace!("Entry #{}: skipping {} at offset {:#x}", entry, attribute_type, offset);
        return Ok(DecodedAttribute::Skipped { attribute_type, length });
    }

    let slice = &record[offset..offset + length];
    let fail = |reason : &str| attribute_error(entry, offset, attribute_type, reason);

    let name = read_attribute_name(slice).ok_or_else(|| fail("attribute name runs past the end of the attribute"))?;
    let flags = AttributeHeader::AH_FLAGS.read(slice).unwrap_or_default();
    let id = AttributeHeader::AH_INSTANCE.read(slice).unwrap_or_default();

    let mut fault = None;

    let (form, content) = match AttributeHeader::AH_FORM_CODE.read(slice) {
        Some(FORM_CODE_RESIDENT) => {
            if slice.len() < ARH_RES_LENGTH {
                return Err(fail("resident header runs past the end of the attribute"));
            }

            let resident = ResidentHeader {
                content_length: AttributeHeader::AH_RES_VALUE_LENGTH.read(slice).unwrap_or_default(),
                content_offset: AttributeHeader::AH_RES_VALUE_OFFSET.read(slice).unwrap_or_default(),
                indexed: AttributeHeader::AH_RES_INDEXED_FLAG.read(slice).unwrap_or_default() != 0,
            };

            let content_start = resident.content_offset as usize;
            let content_end = content_start + resident.content_length as usize;
            let value = slice.get(content_start..content_end)
                .ok_or_else(|| fail(&format!("value {:#x}..{:#x} runs past the end of the attribute", content_start, content_end)))?;

            let content = match decoder_for(attribute_type).decode(value) {
                Ok(content) => Some(content),
                Err(reason) => {
                    fault = Some(reason);
                    None
                }
            };

            (AttributeForm::Resident(resident), content)
        },
        Some(FORM_CODE_NONRESIDENT) => {
            if slice.len() < ARH_NONRES_LENGTH {
                return Err(fail("non-resident header runs past the end of the attribute"));
            }

            let mapping_pairs_offset = AttributeHeader::AH_NONRES_MAPPING_PAIRS_OFFSET.read(slice).unwrap_or_default();
            let mapping_pairs = slice.get(mapping_pairs_offset as usize..)
                .ok_or_else(|| fail("mapping pairs offset is past the end of the attribute"))?;
            let data_runs = decode_data_runs(mapping_pairs).map_err(|reason| fail(&reason))?;

            let non_resident = NonResidentHeader {
                start_vcn: AttributeHeader::AH_NONRES_LOWEST_VCN.read(slice).unwrap_or_default(),
                last_vcn: AttributeHeader::AH_NONRES_HIGHEST_VCN.read(slice).unwrap_or_default(),
                mapping_pairs_offset,
                compression_unit: AttributeHeader::AH_NONRES_COMPRESSION_UNIT.read(slice).unwrap_or_default(),
                alloc_size: AttributeHeader::AH_NONRES_ALLOCATED_LENGTH.read(slice).unwrap_or_default(),
                data_size: AttributeHeader::AH_NONRES_FILE_SIZE.read(slice).unwrap_or_default(),
                initialized_size: AttributeHeader::AH_NONRES_VALID_DATA_LENGTH.read(slice).unwrap_or_default(),
                data_runs,
            };

            (AttributeForm::NonResident(non_resident), None)
        },
        Some(other) => return Err(fail(&format!("unknown form code {:#x}", other))),
        None => return Err(fail("form code runs past the end of the attribute"))
    };

    trace!("Entry #{}: decoded {} '{}' at offset {:#x}, length {}", entry, attribute_type, name, offset, length);

    let header = AttributeHeader { attribute_type, record_length: length as u32, name, flags, id, form };
    Ok(DecodedAttribute::Parsed { attribute: Attribute { header, content, record_number: entry, offset }, length, fault })
}

fn read_attribute_name(slice : &[u8]) -> Option<String> {
    let name_length = AttributeHeader::AH_NAME_LENGTH.read(slice)? as usize;
    if name_length == 0 {
        return Some(String::new());
    }

    let name_offset = AttributeHeader::AH_NAME_OFFSET.read(slice)? as usize;
    slice.get(name_offset..name_offset + name_length * 2).map(utf16le_to_string)
}

fn attribute_error(entry : u64, offset : usize, attribute_type : AttributeType, reason : &str) -> MftError {
    MftError::Attribute { entry, offset, attribute_type, reason: reason.to_owned() }
}
