use byteorder::*;
use log::debug;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::common::*;
use crate::error::{MftError, Result};

pub fn is_valid_signature(signature : u32) -> bool {
    VALID_SIGNATURES.contains(&signature)
}

// Reads a signature at the given offset. Running off the end of the image is not an error here,
// it just means the candidate can't match.
fn read_signature_at<R : Read + Seek>(reader : &mut R, offset : u64) -> Result<Option<u32>> {
    reader.seek(SeekFrom::Start(offset))?;
    match reader.read_u32::<LittleEndian>() {
        Ok(signature) => Ok(Some(signature)),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into())
    }
}

/// Works out the fixed record size used by the image.
///
/// A non-zero `size_override` is taken as is. Otherwise the image must start with a valid
/// signature, and the first candidate size whose offset also holds a valid signature wins.
/// The read position is always left at 0.
pub fn detect_entry_size<R : Read + Seek>(reader : &mut R, size_override : u64) -> Result<u64> {
    let result = detect(reader, size_override);
    reader.seek(SeekFrom::Start(0))?;
    result
}

fn detect<R : Read + Seek>(reader : &mut R, size_override : u64) -> Result<u64> {
    if size_override != 0 {
        debug!("Using entry size override of {} bytes", size_override);
        return Ok(size_override);
    }

    match read_signature_at(reader, 0)? {
        Some(signature) if is_valid_signature(signature) => {},
        Some(signature) => return Err(MftError::Signature { found: signature }),
        None => return Err(MftError::Signature { found: 0 })
    }

    for candidate in ENTRY_SIZE_CANDIDATES {
        if candidate == ENTRY_SIZE_SENTINEL {
            break;
        }

        if let Some(signature) = read_signature_at(reader, candidate)? {
            if is_valid_signature(signature) {
                debug!("Detected entry size of {} bytes", candidate);
                return Ok(candidate);
            }
        }
    }

    Err(MftError::SizeDetection)
}
