use crate::{RandomiserError, Result};

const MAGIC: &[u8] = b"PATCH";
const EOF_MARKER: usize = 0x454F46;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpsRecord {
    Literal { offset: usize, data: Vec<u8> },
    Rle { offset: usize, len: usize, value: u8 },
}

impl IpsRecord {
    fn span(&self) -> (usize, usize) {
        match self {
            IpsRecord::Literal { offset, data } => (*offset, data.len()),
            IpsRecord::Rle { offset, len, .. } => (*offset, *len),
        }
    }
}

fn take<'a>(patch: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = *pos + len;
    if end > patch.len() {
        return Err(RandomiserError::Format(format!(
            "IPS patch truncated at byte {} (needed {} more)",
            *pos,
            end - patch.len()
        )));
    }
    let slice = &patch[*pos..end];
    *pos = end;
    Ok(slice)
}

/// Parses a whole IPS patch and checks every record against a target of
/// `target_len` bytes.
pub fn parse_ips(patch: &[u8], target_len: usize) -> Result<Vec<IpsRecord>> {
    if !patch.starts_with(MAGIC) {
        return Err(RandomiserError::Format(
            "IPS patch does not start with PATCH".to_string(),
        ));
    }

    let mut pos = MAGIC.len();
    let mut records = Vec::new();
    loop {
        let raw = take(patch, &mut pos, 3)?;
        let offset = (raw[0] as usize) << 16 | (raw[1] as usize) << 8 | raw[2] as usize;
        if offset == EOF_MARKER {
            break;
        }

        let raw = take(patch, &mut pos, 2)?;
        let size = u16::from_be_bytes([raw[0], raw[1]]) as usize;
        let record = if size == 0 {
            let raw = take(patch, &mut pos, 3)?;
            IpsRecord::Rle {
                offset,
                len: u16::from_be_bytes([raw[0], raw[1]]) as usize,
                value: raw[2],
            }
        } else {
            IpsRecord::Literal {
                offset,
                data: take(patch, &mut pos, size)?.to_vec(),
            }
        };

        let (start, len) = record.span();
        if start + len > target_len {
            return Err(RandomiserError::Format(format!(
                "IPS record at 0x{:06X} writes {} bytes past the end of a {}-byte target",
                start,
                start + len - target_len,
                target_len
            )));
        }
        records.push(record);
    }

    Ok(records)
}

/// Applies an IPS patch. The target is left untouched unless every record
/// parses and fits.
pub fn apply_ips(patch: &[u8], target: &mut [u8]) -> Result<usize> {
    let records = parse_ips(patch, target.len())?;
    for record in &records {
        match record {
            IpsRecord::Literal { offset, data } => {
                target[*offset..*offset + data.len()].copy_from_slice(data);
            }
            IpsRecord::Rle { offset, len, value } => {
                target[*offset..*offset + *len].fill(*value);
            }
        }
    }
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::{apply_ips, parse_ips, IpsRecord};
    use crate::RandomiserError;

    fn patch(body: &[u8]) -> Vec<u8> {
        let mut out = b"PATCH".to_vec();
        out.extend_from_slice(body);
        out.extend_from_slice(b"EOF");
        out
    }

    #[test]
    fn applies_literal_record() {
        let mut rom = vec![0u8; 32];
        let ips = patch(&[0x00, 0x00, 0x10, 0x00, 0x04, 0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(apply_ips(&ips, &mut rom).unwrap(), 1);
        assert_eq!(&rom[16..20], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert!(rom[..16].iter().all(|&b| b == 0));
        assert!(rom[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn applies_rle_record() {
        let mut rom = vec![0u8; 32];
        let ips = patch(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0xFF]);
        apply_ips(&ips, &mut rom).unwrap();
        assert_eq!(&rom[..4], &[0xFF; 4]);
        assert_eq!(rom[4], 0);
    }

    #[test]
    fn overrun_leaves_target_untouched() {
        let mut rom = vec![0u8; 32];
        let ips = patch(&[
            0x00, 0x00, 0x00, 0x00, 0x01, 0x77, // fits
            0x00, 0x00, 0x1E, 0x00, 0x04, 1, 2, 3, 4, // runs past the end
        ]);
        let err = apply_ips(&ips, &mut rom).unwrap_err();
        assert!(matches!(err, RandomiserError::Format(_)));
        assert_eq!(rom, vec![0u8; 32]);
    }

    #[test]
    fn rejects_bad_magic_and_truncation() {
        let mut rom = vec![0u8; 8];
        assert!(apply_ips(b"PATCX", &mut rom).is_err());
        assert!(apply_ips(b"PATCH\x00\x00\x01\x00\x02\xAA", &mut rom).is_err());
        assert!(apply_ips(b"PATCH", &mut rom).is_err());
    }

    #[test]
    fn parses_mixed_records() {
        let ips = patch(&[0x00, 0x00, 0x02, 0x00, 0x01, 0x42, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x02, 0x09]);
        let records = parse_ips(&ips, 16).unwrap();
        assert_eq!(
            records,
            vec![
                IpsRecord::Literal { offset: 2, data: vec![0x42] },
                IpsRecord::Rle { offset: 5, len: 2, value: 0x09 },
            ]
        );
    }
}
