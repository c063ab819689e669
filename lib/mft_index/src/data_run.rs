/// One contiguous extent of a non-resident stream. `lcn` is None for sparse runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRun {
    pub length : u64,
    pub lcn : Option<u64>,
}

impl DataRun {
    pub fn is_sparse(&self) -> bool {
        self.lcn.is_none()
    }
}

/// Decodes a mapping pairs array into absolute runs.
///
/// Offsets are deltas from the previous run's LCN, starting from 0 for every attribute record.
pub fn decode_data_runs(mapping_pairs : &[u8]) -> Result<Vec<DataRun>, String> {
    let mut runs = vec!();
    let mut run_offset : usize = 0;
    let mut current_lcn : i64 = 0;

    while run_offset < mapping_pairs.len() {
        match read_run(&mapping_pairs[run_offset..])? {
            (0, 0, 0) => {
                // End of runs
                break;
            },
            (length, offset, run_size) => {
                // An offset field of size 0 marks a sparse run, which doesn't move the LCN
                let lcn = if (mapping_pairs[run_offset] >> 4) == 0 {
                    None
                } else {
                    current_lcn = current_lcn.checked_add(offset)
                        .filter(|lcn| *lcn >= 0)
                        .ok_or_else(|| format!("Run at offset {:#x} moves the LCN out of range", run_offset))?;
                    Some(current_lcn as u64)
                };

                runs.push(DataRun { length, lcn });
                run_offset += run_size;
            }
        }
    }

    Ok(runs)
}

/// Reads one mapping pair: (length, offset delta, encoded size). (0, 0, 0) marks the end.
/// The length is unsigned, only the offset delta is sign extended.
fn read_run(run_slice : &[u8]) -> Result<(u64, i64, usize), String> {
    let header = run_slice[0] as usize;

    if header == 0 {
        return Ok((0, 0, 0));
    }

    let length_size = header & 0x0F; // Low nibble
    let offset_size = header >> 4; // High nibble

    if length_size > 8 || offset_size > 8 {
        return Err(format!("Run header {:#04x} has a field wider than 8 bytes", header));
    }

    let run_length = length_size + offset_size + 1;

    if run_slice.len() < run_length {
        Err(format!("Run header {:#04x} needs {} bytes, only {} remain", header, run_length, run_slice.len()))
    } else {
        Ok(
            (read_run_varbyte_u64(&run_slice[1..length_size+1]),
            read_run_varbyte_i64(&run_slice[length_size+1..length_size+offset_size+1]),
            run_length)
        )
    }
}

fn read_run_varbyte_u64(run_slice : &[u8]) -> u64 {
    run_slice.iter().enumerate().fold(0u64, |result, (index, current_byte)| result | (*current_byte as u64) << (index * 8))
}

fn read_run_varbyte_i64(run_slice : &[u8]) -> i64 {
    let length = run_slice.len();

    let mut result : i64 = 0;
    let mut is_negative : bool = false;

    for (index, current_byte) in run_slice.iter().enumerate() {
        result |= (*current_byte as i64) << (index * 8);
        is_negative = (current_byte & 0x80) > 0;
    }

    if is_negative && length < 8 {
        // Highest bit is negative, this means we need to pad out the rest of the bytes with 0xFF to make the result negative
        result |= -1i64 << (length * 8);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_varbyte_read_basic() {
        let simple_run : [u8; 4] = [0x21, 0x18, 0x34, 0x56];

        let result = read_run(&simple_run[..]).unwrap();

        assert_eq!(result.0, 0x18);
        assert_eq!(result.1, 0x5634);
        assert_eq!(result.2, 4);

        let longer_run : [u8; 11] = [0x82, 0x34, 0x56, 0x12, 0x23, 0x34, 0x45, 0x54, 0x43, 0x32, 0x21];
        let longer_result = read_run(&longer_run[..]).unwrap();

        assert_eq!(longer_result.0, 0x5634);
        assert_eq!(longer_result.1, 0x2132435445342312);
        assert_eq!(longer_result.2, 11);
    }

    #[test]
    fn test_run_varbyte_read_negative() {
        let negative_run : [u8; 4] = [0x21, 0x87, 0x34, 0xF6];
        let result = read_run(&negative_run[..]).unwrap();

        assert_eq!(result.0, 0x87); // Lengths are never sign extended
        assert_eq!(result.1, -2508); // 0xF634 == -2508
        assert_eq!(result.2, 4);
    }

    #[test]
    fn test_run_invalid_len() {
        // First nibble is too large for slice
        let invalid_run_1 : [u8; 4] = [0x31, 0x18, 0x34, 0x56];
        assert!(read_run(&invalid_run_1[..]).is_err());

        // Low nibble is straight up out of range
        let invalid_run_2 : [u8; 13] = [0x19, 0x18, 0x34, 0x56, 0x18, 0x34, 0x56, 0x18, 0x34, 0x56, 0x18, 0x34, 0x56];
        assert!(read_run(&invalid_run_2[..]).is_err());
    }

    #[test]
    fn test_decode_resolves_relative_offsets() {
        // 0x18 clusters @ 0x5634, then 0x10 clusters 0x100 back, then a sparse run of 7
        let mapping_pairs = [0x21, 0x18, 0x34, 0x56, 0x21, 0x10, 0x00, 0xFF, 0x01, 0x07, 0x00];
        let runs = decode_data_runs(&mapping_pairs).unwrap();

        assert_eq!(runs, vec![
            DataRun { length: 0x18, lcn: Some(0x5634) },
            DataRun { length: 0x10, lcn: Some(0x5534) },
            DataRun { length: 7, lcn: None },
        ]);
        assert!(runs[2].is_sparse());
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        let mapping_pairs = [0x11, 0x04, 0x20, 0x00, 0x11, 0x01, 0x01];
        let runs = decode_data_runs(&mapping_pairs).unwrap();
        assert_eq!(runs, vec![DataRun { length: 4, lcn: Some(0x20) }]);
    }

    #[test]
    fn test_decode_length_with_high_bit_set() {
        // 128 clusters at LCN 0x10, then 0xFFFF clusters 0x10 further on
        let mapping_pairs = [0x11, 0x80, 0x10, 0x12, 0xFF, 0xFF, 0x10, 0x00];
        let runs = decode_data_runs(&mapping_pairs).unwrap();

        assert_eq!(runs, vec![
            DataRun { length: 0x80, lcn: Some(0x10) },
            DataRun { length: 0xFFFF, lcn: Some(0x20) },
        ]);
    }

    #[test]
    fn test_decode_rejects_negative_lcn() {
        let mapping_pairs = [0x11, 0x04, 0xF0, 0x00];
        assert!(decode_data_runs(&mapping_pairs).is_err());
    }
}
