
// Entry signatures, as read little-endian from the first four bytes of a record
pub const SIGNATURE_FILE : u32 = 0x454c4946; // The ASCII string "FILE" converted to a u32
pub const SIGNATURE_BAAD : u32 = 0x44414142; // "BAAD", written by chkdsk over records it found corrupt
pub const VALID_SIGNATURES : [u32; 2] = [SIGNATURE_FILE, SIGNATURE_BAAD];

// Candidate entry sizes, in the order they are tried. 1 is the sentinel that ends detection.
pub const ENTRY_SIZE_CANDIDATES : [u64; 7] = [1024, 4096, 512, 2048, 256, 8192, 1];
pub const ENTRY_SIZE_SENTINEL : u64 = 1;

// Offsets into the FILE_RECORD_SEGMENT_HEADER structure
// From https://docs.microsoft.com/en-us/windows/win32/devnotes/file-record-segment-header
pub const FRSH_SIGNATURE_OFFSET : usize = 0x00;
pub const FRSH_FIXUP_ARRAY_OFFSET : usize = 0x04;
pub const FRSH_FIXUP_ARRAY_COUNT : usize = 0x06;
pub const FRSH_LOGFILE_SEQUENCE_NUMBER : usize = 0x08;
pub const FRSH_SEQUENCE_NUMBER_OFFSET : usize = 0x10;
pub const FRSH_HARD_LINK_COUNT_OFFSET : usize = 0x12;
pub const FRSH_FIRST_ATTRIBUTE_OFFSET : usize = 0x14;
pub const FRSH_FLAGS_OFFSET : usize = 0x16;
pub const FRSH_USED_SIZE_OFFSET : usize = 0x18;
pub const FRSH_ALLOCATED_SIZE_OFFSET : usize = 0x1C;
pub const FRSH_BASE_RECORD_OFFSET : usize = 0x20;
pub const FRSH_BASE_RECORD_SEQUENCE_OFFSET : usize = 0x26;
pub const FRSH_NEXT_ATTRIBUTE_ID_OFFSET : usize = 0x28;
pub const FRSH_RECORD_NUMBER_OFFSET : usize = 0x2C;
pub const FRSH_LENGTH : usize = 0x30;

// The stub pass reads only the fixed header prefix. Everything it needs sits well before
// the first fix-up location at 510, so it reads without applying the fix-up array.
pub const STUB_LENGTH : usize = FRSH_LENGTH;

// Fix-up array sectors are always 512 bytes regardless of the device sector size
pub const FIXUP_SECTOR_SIZE : usize = 512;

// File record flags
pub const FILE_RECORD_FLAG_IN_USE : u16 = 0x01;
pub const FILE_RECORD_FLAG_DIRECTORY : u16 = 0x02;

// Attribute form code
pub const FORM_CODE_RESIDENT : u8 = 0x0;
pub const FORM_CODE_NONRESIDENT : u8 = 0x1;

// Offsets into the ATTRIBUTE_RECORD_HEADER structure
// From https://docs.microsoft.com/en-us/windows/win32/devnotes/attribute-record-header
pub const ARH_TYPE_CODE_OFFSET : usize = 0x00;
pub const ARH_RECORD_LENGTH_OFFSET : usize = 0x04;
pub const ARH_FORM_CODE_OFFSET : usize = 0x08;
pub const ARH_NAME_LENGTH_OFFSET : usize = 0x09;
pub const ARH_NAME_OFFSET_OFFSET : usize = 0x0A;
pub const ARH_FLAGS_OFFSET : usize = 0x0C;
pub const ARH_INSTANCE_OFFSET : usize = 0x0E;
pub const ARH_BASIC_LENGTH : usize = 0x08; // Type and length only
pub const ARH_COMMON_LENGTH : usize = 0x10;

// Resident attributes carry their value inline
pub const ARH_RES_VALUE_LENGTH_OFFSET : usize = 0x10;
pub const ARH_RES_VALUE_OFFSET_OFFSET : usize = 0x14;
pub const ARH_RES_INDEXED_FLAG_OFFSET : usize = 0x16;
pub const ARH_RES_LENGTH : usize = 0x18; // The offset to the end of a "resident" type header

// Non-resident attributes mark where the data for the attribute lives, which could include the data for the file
pub const ARH_NONRES_LOWEST_VCN_OFFSET : usize = 0x10;
pub const ARH_NONRES_HIGHEST_VCN_OFFSET : usize = 0x18;
pub const ARH_NONRES_MAPPING_PAIRS_OFFSET_OFFSET : usize = 0x20;
pub const ARH_NONRES_COMPRESSION_UNIT_OFFSET : usize = 0x22;
pub const ARH_NONRES_ALLOCATED_LENGTH_OFFSET : usize = 0x28;
pub const ARH_NONRES_FILE_SIZE_OFFSET : usize = 0x30;
pub const ARH_NONRES_VALID_DATA_LENGTH_OFFSET : usize = 0x38;
pub const ARH_NONRES_LENGTH : usize = 0x40;

// Terminates the attribute list of a record
pub const ATTR_END_MARKER : u32 = 0xffffffff;

// From https://docs.microsoft.com/en-us/windows/win32/devnotes/attribute-record-header
pub const ATTR_STANDARD_INFORMATION : u32 = 0x10;
pub const ATTR_ATTRIBUTE_LIST : u32 = 0x20;
pub const ATTR_FILE_NAME : u32 = 0x30;
pub const ATTR_OBJECT_ID : u32 = 0x40;
pub const ATTR_SECURITY_DESCRIPTOR : u32 = 0x50;
pub const ATTR_VOLUME_NAME : u32 = 0x60;
pub const ATTR_VOLUME_INFORMATION : u32 = 0x70;
pub const ATTR_DATA : u32 = 0x80;
pub const ATTR_INDEX_ROOT : u32 = 0x90;
pub const ATTR_INDEX_ALLOCATION : u32 = 0xA0;
pub const ATTR_BITMAP : u32 = 0xB0;
pub const ATTR_REPARSE_POINT : u32 = 0xC0;
pub const ATTR_EA_INFORMATION : u32 = 0xD0;
pub const ATTR_EA : u32 = 0xE0;
pub const ATTR_PROPERTY_SET : u32 = 0xF0;
pub const ATTR_LOGGED_UTILITY_STREAM : u32 = 0x100;

// FILE_NAME namespaces
pub const FILE_NAME_NAMESPACE_DOS : u8 = 2;
