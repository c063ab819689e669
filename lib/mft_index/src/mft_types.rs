use crate::attribute::AttributeType;
use crate::common::*;
use crate::slice_utils::*;

/// Decoded value of a resident attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeContent {
    StandardInformation(StandardInformation),
    AttributeList(Vec<AttributeListEntry>),
    FileName(FileNameInfo),
    ObjectId(ObjectIdInfo),
    VolumeName(String),
    VolumeInformation(VolumeInformation),
    /// DATA values and every type without a dedicated decoder
    Raw(Vec<u8>),
}

/// Turns a resident attribute value into its decoded form
pub trait ContentDecoder : Sync {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String>;
}

struct StandardInformationDecoder;
struct AttributeListDecoder;
struct FileNameDecoder;
struct ObjectIdDecoder;
struct VolumeNameDecoder;
struct VolumeInformationDecoder;
struct RawDecoder;

static STANDARD_INFORMATION_DECODER : StandardInformationDecoder = StandardInformationDecoder;
static ATTRIBUTE_LIST_DECODER : AttributeListDecoder = AttributeListDecoder;
static FILE_NAME_DECODER : FileNameDecoder = FileNameDecoder;
static OBJECT_ID_DECODER : ObjectIdDecoder = ObjectIdDecoder;
static VOLUME_NAME_DECODER : VolumeNameDecoder = VolumeNameDecoder;
static VOLUME_INFORMATION_DECODER : VolumeInformationDecoder = VolumeInformationDecoder;
static RAW_DECODER : RawDecoder = RawDecoder;

/// The type -> decoder table
pub fn decoder_for(attribute_type : AttributeType) -> &'static dyn ContentDecoder {
    match attribute_type {
        AttributeType::StandardInformation => &STANDARD_INFORMATION_DECODER,
        AttributeType::AttributeList => &ATTRIBUTE_LIST_DECODER,
        AttributeType::FileName => &FILE_NAME_DECODER,
        AttributeType::ObjectId => &OBJECT_ID_DECODER,
        AttributeType::VolumeName => &VOLUME_NAME_DECODER,
        AttributeType::VolumeInformation => &VOLUME_INFORMATION_DECODER,
        _ => &RAW_DECODER
    }
}

fn require_length(value : &[u8], minimum : usize, what : &str) -> Result<(), String> {
    if value.len() < minimum {
        Err(format!("{} value is {} bytes, expected at least {}", what, value.len(), minimum))
    } else {
        Ok(())
    }
}

// Fields are only read after a length check, so a missing field is a bug in the table below
fn field<T : SliceReadable + std::fmt::Debug>(field : &MftDataField<T>, value : &[u8]) -> Result<T, String> {
    field.read(value).ok_or_else(|| format!("{} is past the end of the value", field.get_name()))
}

impl ContentDecoder for RawDecoder {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String> {
        Ok(AttributeContent::Raw(value.to_vec()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandardInformation {
    pub created : FileTime,
    pub modified : FileTime,
    pub mft_modified : FileTime,
    pub accessed : FileTime,
    pub file_attributes : u32,
    // Only present in the NTFS 3.0+ layout
    pub owner_id : Option<u32>,
    pub security_id : Option<u32>,
    pub quota_charged : Option<u64>,
    pub usn : Option<u64>,
}

impl StandardInformation {
    const MIN_LENGTH : usize = 0x30;
    const EXTENDED_LENGTH : usize = 0x48;

    const SI_CREATE_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("CreatedTimestamp", 0x00);
    const SI_ALTERED_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("AlteredTimestamp", 0x08);
    const SI_MFT_CHANGED_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("ChangedTimestamp", 0x10);
    const SI_READ_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("ReadTimestamp", 0x18);
    const SI_PERMISSIONS : MftDataField<u32> = MftDataField::<u32>::new("Permissions", 0x20);
    const SI_OWNER_ID : MftDataField<u32> = MftDataField::<u32>::new("OwnerId", 0x30);
    const SI_SECURITY_ID : MftDataField<u32> = MftDataField::<u32>::new("SecurityId", 0x34);
    const SI_QUOTA_CHARGED : MftDataField<u64> = MftDataField::<u64>::new("QuotaCharged", 0x38);
    const SI_USN : MftDataField<u64> = MftDataField::<u64>::new("Usn", 0x40);
}

impl ContentDecoder for StandardInformationDecoder {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String> {
        require_length(value, StandardInformation::MIN_LENGTH, "$STANDARD_INFORMATION")?;
        let extended = value.len() >= StandardInformation::EXTENDED_LENGTH;

        Ok(AttributeContent::StandardInformation(StandardInformation {
            created: field(&StandardInformation::SI_CREATE_TIMESTAMP, value)?,
            modified: field(&StandardInformation::SI_ALTERED_TIMESTAMP, value)?,
            mft_modified: field(&StandardInformation::SI_MFT_CHANGED_TIMESTAMP, value)?,
            accessed: field(&StandardInformation::SI_READ_TIMESTAMP, value)?,
            file_attributes: field(&StandardInformation::SI_PERMISSIONS, value)?,
            owner_id: extended.then(|| StandardInformation::SI_OWNER_ID.read(value)).flatten(),
            security_id: extended.then(|| StandardInformation::SI_SECURITY_ID.read(value)).flatten(),
            quota_charged: extended.then(|| StandardInformation::SI_QUOTA_CHARGED.read(value)).flatten(),
            usn: extended.then(|| StandardInformation::SI_USN.read(value)).flatten(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileNameInfo {
    pub parent_record : u64,
    pub parent_sequence : u16,
    pub created : FileTime,
    pub modified : FileTime,
    pub mft_modified : FileTime,
    pub accessed : FileTime,
    pub allocated_size : u64,
    pub real_size : u64,
    pub flags : u32,
    pub namespace : u8,
    pub name : String,
}

impl FileNameInfo {
    // FILE_NAME offsets
    // From https://docs.microsoft.com/en-us/windows/win32/devnotes/file-name
    const FN_PARENT_DIR_REFERENCE : MftDataField<u48> = MftDataField::<u48>::new("ParentDirId", 0x00);
    const FN_PARENT_DIR_SEQUENCE : MftDataField<u16> = MftDataField::<u16>::new("ParentDirSequence", 0x06);
    const FN_CREATE_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("CreatedTimestamp", 0x08);
    const FN_ALTERED_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("AlteredTimestamp", 0x10);
    const FN_MFT_CHANGED_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("ChangedTimestamp", 0x18);
    const FN_READ_TIMESTAMP : MftDataField<FileTime> = MftDataField::<FileTime>::new("ReadTimestamp", 0x20);
    const FN_ALLOCATED_SIZE_OF_FILE : MftDataField<u64> = MftDataField::<u64>::new("AllocatedSizeOfFile", 0x28);
    const FN_REAL_SIZE_OF_FILE : MftDataField<u64> = MftDataField::<u64>::new("RealSizeOfFile", 0x30);
    const FN_FLAGS : MftDataField<u32> = MftDataField::<u32>::new("Flags", 0x38);
    const FN_FILE_NAME_LENGTH : MftDataField<u8> = MftDataField::<u8>::new("FileNameLengthInChars", 0x40);
    const FN_FILE_NAME_NAMESPACE : MftDataField<u8> = MftDataField::<u8>::new("Namespace", 0x41);
    const FN_FILE_NAME_DATA_OFFSET : usize = 0x42;

    pub fn is_dos_name(&self) -> bool {
        self.namespace == FILE_NAME_NAMESPACE_DOS
    }
}

impl ContentDecoder for FileNameDecoder {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String> {
        require_length(value, FileNameInfo::FN_FILE_NAME_DATA_OFFSET, "$FILE_NAME")?;

        let name_length = field(&FileNameInfo::FN_FILE_NAME_LENGTH, value)? as usize;
        let name_range = FileNameInfo::FN_FILE_NAME_DATA_OFFSET..FileNameInfo::FN_FILE_NAME_DATA_OFFSET + name_length * 2;
        let name_bytes = value.get(name_range.clone())
            .ok_or_else(|| format!("$FILE_NAME name {:#x}..{:#x} runs past the value of {} bytes", name_range.start, name_range.end, value.len()))?;

        Ok(AttributeContent::FileName(FileNameInfo {
            parent_record: field(&FileNameInfo::FN_PARENT_DIR_REFERENCE, value)?.into(),
            parent_sequence: field(&FileNameInfo::FN_PARENT_DIR_SEQUENCE, value)?,
            created: field(&FileNameInfo::FN_CREATE_TIMESTAMP, value)?,
            modified: field(&FileNameInfo::FN_ALTERED_TIMESTAMP, value)?,
            mft_modified: field(&FileNameInfo::FN_MFT_CHANGED_TIMESTAMP, value)?,
            accessed: field(&FileNameInfo::FN_READ_TIMESTAMP, value)?,
            allocated_size: field(&FileNameInfo::FN_ALLOCATED_SIZE_OF_FILE, value)?,
            real_size: field(&FileNameInfo::FN_REAL_SIZE_OF_FILE, value)?,
            flags: field(&FileNameInfo::FN_FLAGS, value)?,
            namespace: field(&FileNameInfo::FN_FILE_NAME_NAMESPACE, value)?,
            name: utf16le_to_string(name_bytes),
        }))
    }
}

/// One row of an $ATTRIBUTE_LIST: where a particular attribute of the file physically lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeListEntry {
    pub attribute_type : AttributeType,
    pub start_vcn : u64,
    pub segment_record : u64,
    pub segment_sequence : u16,
    pub attribute_id : u16,
    pub name : String,
}

impl AttributeListEntry {
    const AL_TYPE_CODE : MftDataField<u32> = MftDataField::<u32>::new("TypeCode", 0x00);
    const AL_RECORD_LENGTH : MftDataField<u16> = MftDataField::<u16>::new("RecordLength", 0x04);
    const AL_NAME_LENGTH : MftDataField<u8> = MftDataField::<u8>::new("NameLength", 0x06);
    const AL_NAME_OFFSET : MftDataField<u8> = MftDataField::<u8>::new("NameOffset", 0x07);
    const AL_LOWEST_VCN : MftDataField<u64> = MftDataField::<u64>::new("LowestVcn", 0x08);
    const AL_SEGMENT_REFERENCE : MftDataField<u48> = MftDataField::<u48>::new("SegmentReference", 0x10);
    const AL_SEGMENT_SEQUENCE : MftDataField<u16> = MftDataField::<u16>::new("SegmentSequence", 0x16);
    const AL_INSTANCE : MftDataField<u16> = MftDataField::<u16>::new("Instance", 0x18);
    const AL_MIN_LENGTH : usize = 0x1A;
}

impl ContentDecoder for AttributeListDecoder {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String> {
        let mut entries = vec!();
        let mut offset = 0usize;

        while offset + AttributeListEntry::AL_MIN_LENGTH <= value.len() {
            let row = &value[offset..];
            let record_length = field(&AttributeListEntry::AL_RECORD_LENGTH, row)? as usize;

            if record_length < AttributeListEntry::AL_MIN_LENGTH || record_length > row.len() {
                return Err(format!("$ATTRIBUTE_LIST row at {:#x} has invalid length {}", offset, record_length));
            }

            let row = &row[..record_length];
            let name_length = field(&AttributeListEntry::AL_NAME_LENGTH, row)? as usize;
            let name_offset = field(&AttributeListEntry::AL_NAME_OFFSET, row)? as usize;
            let name = match name_length {
                0 => String::new(),
                _ => row.get(name_offset..name_offset + name_length * 2)
                    .map(utf16le_to_string)
                    .ok_or_else(|| format!("$ATTRIBUTE_LIST row at {:#x} has a name past its end", offset))?
            };

            entries.push(AttributeListEntry {
                attribute_type: AttributeType::from_code(field(&AttributeListEntry::AL_TYPE_CODE, row)?),
                start_vcn: field(&AttributeListEntry::AL_LOWEST_VCN, row)?,
                segment_record: field(&AttributeListEntry::AL_SEGMENT_REFERENCE, row)?.into(),
                segment_sequence: field(&AttributeListEntry::AL_SEGMENT_SEQUENCE, row)?,
                attribute_id: field(&AttributeListEntry::AL_INSTANCE, row)?,
                name,
            });

            offset += record_length;
        }

        Ok(AttributeContent::AttributeList(entries))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid ( pub [u8; 16] );

impl std::fmt::Display for Guid {
    fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = &self.0;
        write!(f, "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdInfo {
    pub object_id : Guid,
    pub birth_volume_id : Option<Guid>,
    pub birth_object_id : Option<Guid>,
    pub domain_id : Option<Guid>,
}

fn read_guid(value : &[u8], offset : usize) -> Option<Guid> {
    let bytes = value.get(offset..offset + 16)?;
    let mut guid = [0u8; 16];
    guid.copy_from_slice(bytes);
    Some(Guid(guid))
}

impl ContentDecoder for ObjectIdDecoder {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String> {
        let object_id = read_guid(value, 0).ok_or_else(|| format!("$OBJECT_ID value is {} bytes, expected at least 16", value.len()))?;

        Ok(AttributeContent::ObjectId(ObjectIdInfo {
            object_id,
            birth_volume_id: read_guid(value, 16),
            birth_object_id: read_guid(value, 32),
            domain_id: read_guid(value, 48),
        }))
    }
}

impl ContentDecoder for VolumeNameDecoder {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String> {
        Ok(AttributeContent::VolumeName(utf16le_to_string(value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInformation {
    pub major_version : u8,
    pub minor_version : u8,
    pub flags : u16,
}

impl VolumeInformation {
    const VI_MAJOR_VERSION : MftDataField<u8> = MftDataField::<u8>::new("MajorVersion", 0x08);
    const VI_MINOR_VERSION : MftDataField<u8> = MftDataField::<u8>::new("MinorVersion", 0x09);
    const VI_FLAGS : MftDataField<u16> = MftDataField::<u16>::new("Flags", 0x0A);
}

impl ContentDecoder for VolumeInformationDecoder {
    fn decode(&self, value : &[u8]) -> Result<AttributeContent, String> {
        require_length(value, 0x0C, "$VOLUME_INFORMATION")?;

        Ok(AttributeContent::VolumeInformation(VolumeInformation {
            major_version: field(&VolumeInformation::VI_MAJOR_VERSION, value)?,
            minor_version: field(&VolumeInformation::VI_MINOR_VERSION, value)?,
            flags: field(&VolumeInformation::VI_FLAGS, value)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_image::*;

    #[test]
    fn test_decode_file_name() {
        let value = file_name_value(5, 5, "hello.txt", 1);

        match decoder_for(AttributeType::FileName).decode(&value).unwrap() {
            AttributeContent::FileName(info) => {
                assert_eq!(info.parent_record, 5);
                assert_eq!(info.parent_sequence, 5);
                assert_eq!(info.name, "hello.txt");
                assert_eq!(info.namespace, 1);
                assert!(!info.is_dos_name());
            },
            other => panic!("Unexpected content {:?}", other)
        }
    }

    #[test]
    fn test_decode_file_name_truncated_name() {
        let mut value = file_name_value(5, 5, "hello.txt", 1);
        value.truncate(0x46);
        assert!(decoder_for(AttributeType::FileName).decode(&value).is_err());
    }

    #[test]
    fn test_decode_standard_information() {
        let mut value = vec![0u8; 0x48];
        value[0x00..0x08].copy_from_slice(&125_911_584_000_000_000u64.to_le_bytes());
        value[0x20..0x24].copy_from_slice(&0x20u32.to_le_bytes());
        value[0x34..0x38].copy_from_slice(&0x101u32.to_le_bytes());

        match decoder_for(AttributeType::StandardInformation).decode(&value).unwrap() {
            AttributeContent::StandardInformation(info) => {
                assert_eq!(info.created.to_datetime().unwrap().timestamp(), 946_684_800);
                assert_eq!(info.file_attributes, 0x20);
                assert_eq!(info.security_id, Some(0x101));
            },
            other => panic!("Unexpected content {:?}", other)
        }

        // The old 48 byte layout has no security fields
        match decoder_for(AttributeType::StandardInformation).decode(&value[..0x30]).unwrap() {
            AttributeContent::StandardInformation(info) => assert_eq!(info.security_id, None),
            other => panic!("Unexpected content {:?}", other)
        }

        assert!(decoder_for(AttributeType::StandardInformation).decode(&value[..0x20]).is_err());
    }

    #[test]
    fn test_decode_attribute_list() {
        let mut value = attribute_list_row(ATTR_STANDARD_INFORMATION, 0, 12, 1, "");
        value.extend(attribute_list_row(ATTR_DATA, 0x40, 13, 2, "ads"));

        match decoder_for(AttributeType::AttributeList).decode(&value).unwrap() {
            AttributeContent::AttributeList(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].attribute_type, AttributeType::StandardInformation);
                assert_eq!(rows[0].segment_record, 12);
                assert_eq!(rows[1].attribute_type, AttributeType::Data);
                assert_eq!(rows[1].start_vcn, 0x40);
                assert_eq!(rows[1].segment_record, 13);
                assert_eq!(rows[1].segment_sequence, 2);
                assert_eq!(rows[1].name, "ads");
            },
            other => panic!("Unexpected content {:?}", other)
        }
    }

    #[test]
    fn test_decode_attribute_list_bad_row_length() {
        let mut value = attribute_list_row(ATTR_DATA, 0, 12, 1, "");
        value[4..6].copy_from_slice(&4u16.to_le_bytes());
        assert!(decoder_for(AttributeType::AttributeList).decode(&value).is_err());
    }

    #[test]
    fn test_decode_object_id_and_volume() {
        let mut value = vec![0u8; 16];
        value[0] = 0x78;
        value[3] = 0x12;
        match decoder_for(AttributeType::ObjectId).decode(&value).unwrap() {
            AttributeContent::ObjectId(info) => {
                assert_eq!(info.object_id.to_string(), "12000078-0000-0000-0000-000000000000");
                assert!(info.birth_volume_id.is_none());
            },
            other => panic!("Unexpected content {:?}", other)
        }

        let name : Vec<u8> = "DATA".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decoder_for(AttributeType::VolumeName).decode(&name).unwrap(), AttributeContent::VolumeName("DATA".to_owned()));

        let mut info = vec![0u8; 12];
        info[8] = 3;
        info[9] = 1;
        match decoder_for(AttributeType::VolumeInformation).decode(&info).unwrap() {
            AttributeContent::VolumeInformation(vi) => assert_eq!((vi.major_version, vi.minor_version), (3, 1)),
            other => panic!("Unexpected content {:?}", other)
        }
    }

    #[test]
    fn test_unhandled_types_are_opaque() {
        let value = [1u8, 2, 3];
        assert_eq!(decoder_for(AttributeType::SecurityDescriptor).decode(&value).unwrap(), AttributeContent::Raw(vec![1, 2, 3]));
        assert_eq!(decoder_for(AttributeType::Unknown(0x1000)).decode(&value).unwrap(), AttributeContent::Raw(vec![1, 2, 3]));
    }
}
