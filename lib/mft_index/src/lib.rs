//! Offline reconstruction of NTFS Master File Table entries from a raw MFT image.
//!
//! `MftIndex` is the entry point: it detects the record size, pre-scans every slot for
//! base/child relations and then serves fully merged logical entries on demand.

pub mod attribute;
pub mod cache;
pub mod common;
pub mod config;
pub mod data_run;
pub mod datastream;
pub mod entry_reader;
pub mod entry_size;
pub mod error;
pub mod mft_index;
pub mod mft_parser;
pub mod mft_types;
pub mod slice_utils;
pub mod stub_scanner;

#[cfg(test)]
mod test_image;

pub use crate::attribute::{Attribute, AttributeType};
pub use crate::config::{AttributeLoadFlags, MftConfig};
pub use crate::datastream::Datastream;
pub use crate::error::{MftError, Result};
pub use crate::mft_index::{Entries, MftIndex};
pub use crate::mft_parser::{EntryHeader, LogicalEntry};
