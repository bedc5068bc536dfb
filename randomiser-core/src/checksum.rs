use flate2::Crc;

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.sum()
}

/// Checksum of a reference text file: CRC32 over every trimmed,
/// non-empty line, concatenated without separators.
pub fn reference_file_checksum(text: &str) -> u32 {
    let mut crc = Crc::new();
    for line in text.lines() {
        let line = line.trim();
        if !line.is_empty() {
            crc.update(line.as_bytes());
        }
    }
    crc.sum()
}
