use byteorder::*;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::Range;

/// A named, fixed-offset field inside an on-disk structure.
///
/// Fields are declared as constants next to the structure that owns them and read
/// on demand, so the same declarations drive both parsing and the field display
/// in the inspection tooling.
pub struct MftDataField<T : SliceReadable> {
    name : &'static str,
    offset : usize,
    phantom : PhantomData<T>
}

pub struct FieldDisplayInfo {
    pub name : &'static str,
    pub range : Range<usize>,
    pub display_string : String
}

impl<T : SliceReadable + Debug> MftDataField<T> {
    pub const fn new(name : &'static str, offset : usize) -> Self {
        MftDataField { name, offset, phantom: PhantomData }
    }

    /// Reads the field, or None if the slice is too short to hold it
    pub fn read(&self, slice : &[u8]) -> Option<T> {
        slice.get(self.get_range()).map(T::read)
    }

    pub fn get_range(&self) -> Range<usize> {
        self.offset..self.offset + T::SIZE
    }

    pub fn get_name(&self) -> &'static str {
        self.name
    }

    pub fn get_display_info(&self, slice : &[u8]) -> Option<FieldDisplayInfo> {
        self.read(slice).map(|value| FieldDisplayInfo { name: self.name, range: self.get_range(), display_string: format!("{:?}", value) })
    }
}

// Slice readable types. `read` is always handed a slice of exactly SIZE bytes.
pub trait SliceReadable : Sized {
    const SIZE : usize;
    fn read(slice : &[u8]) -> Self;
}

impl SliceReadable for u64 {
    const SIZE : usize = 8;
    fn read(slice : &[u8]) -> u64 { LittleEndian::read_u64(slice) }
}

impl SliceReadable for u32 {
    const SIZE : usize = 4;
    fn read(slice : &[u8]) -> u32 { LittleEndian::read_u32(slice) }
}

impl SliceReadable for u16 {
    const SIZE : usize = 2;
    fn read(slice : &[u8]) -> u16 { LittleEndian::read_u16(slice) }
}

impl SliceReadable for u8 {
    const SIZE : usize = 1;
    fn read(slice : &[u8]) -> u8 { slice[0] }
}

// Special shenanigans for our u48, used by file references
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct u48 ( u64 );

impl From<&[u8]> for u48 {
    fn from(slice: &[u8]) -> Self {
        u48 ( LittleEndian::read_u48(&slice[0..6]))
    }
}

impl From<u48> for u64 {
    fn from(value : u48) -> u64 {
        value.0
    }
}

impl SliceReadable for u48 {
    const SIZE : usize = 6;
    fn read(slice : &[u8]) -> u48 { u48::from(slice) }
}

/// Windows FILETIME: the number of 100ns increments since 1601/01/01 00:00:00 UTC
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FileTime ( pub u64 );

impl FileTime {
    const TICKS_PER_SECOND : u64 = 10_000_000;
    const SECONDS_TO_UNIX_EPOCH : i64 = 11_644_473_600;

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let seconds = (self.0 / Self::TICKS_PER_SECOND) as i64 - Self::SECONDS_TO_UNIX_EPOCH;
        let nanos = (self.0 % Self::TICKS_PER_SECOND) as u32 * 100;
        DateTime::from_timestamp(seconds, nanos)
    }
}

impl Debug for FileTime {
    fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.7f")),
            None => write!(f, "FILETIME({:#x})", self.0)
        }
    }
}

impl SliceReadable for FileTime {
    const SIZE : usize = 8;
    fn read(slice : &[u8]) -> FileTime { FileTime(LittleEndian::read_u64(slice)) }
}

/// Decodes a UTF-16LE byte slice, replacing invalid sequences
pub fn utf16le_to_string(bytes : &[u8]) -> String {
    let units : Vec<u16> = bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
    String::from_utf16_lossy(&units)
}
