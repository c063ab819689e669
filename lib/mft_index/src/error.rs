use thiserror::Error;

use crate::attribute::AttributeType;

pub type Result<T> = std::result::Result<T, MftError>;

#[derive(Debug, Error)]
pub enum MftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not an MFT image: signature {found:#010x} at offset 0")]
    Signature { found : u32 },

    #[error("Could not determine entry size: no candidate offset carries a valid signature")]
    SizeDetection,

    #[error("Malformed header in entry #{entry}: {reason}")]
    Header { entry : u64, reason : String, raw : Vec<u8> },

    #[error("Entry #{entry}: {reason}")]
    Entry { entry : u64, reason : String },

    #[error("Entry #{entry}: bad {attribute_type:?} attribute at offset {offset:#x}: {reason}")]
    Attribute { entry : u64, offset : usize, attribute_type : AttributeType, reason : String },

    #[error("Data stream error: {0}")]
    DataStream(String),

    #[error("Entry #{0} is empty")]
    EntryIsEmpty(u64),

    #[error("Entry #{entry} is a child entry of #{parent} and has no independent identity")]
    EntryIsChild { entry : u64, parent : u64 },

    #[error("Internal consistency error: {0}")]
    Consistency(String),
}

impl MftError {
    /// Lookup failures are expected while walking slots and should be skipped, not treated as fatal
    pub fn is_lookup(&self) -> bool {
        matches!(self, MftError::EntryIsEmpty(_) | MftError::EntryIsChild { .. })
    }

    /// Entry number this error is scoped to, if it only affects a single record
    pub fn entry_number(&self) -> Option<u64> {
        match self {
            MftError::Header { entry, .. }
            | MftError::Entry { entry, .. }
            | MftError::Attribute { entry, .. }
            | MftError::EntryIsChild { entry, .. } => Some(*entry),
            MftError::EntryIsEmpty(entry) => Some(*entry),
            _ => None
        }
    }
}
