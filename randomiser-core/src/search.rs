use crate::{RandomiserError, Result};

/// Knuth-Morris-Pratt failure table for `needle`.
fn failure_table(needle: &[u8]) -> Vec<isize> {
    let mut table = vec![0isize; needle.len().max(2)];
    table[0] = -1;
    let mut pos = 2;
    let mut cnd: isize = 0;
    while pos < needle.len() {
        if needle[pos - 1] == needle[cnd as usize] {
            cnd += 1;
            table[pos] = cnd;
            pos += 1;
        } else if cnd > 0 {
            cnd = table[cnd as usize];
        } else {
            table[pos] = 0;
            pos += 1;
        }
    }
    table
}

/// Every non-overlapping occurrence of `needle` in `haystack`.
pub fn search(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    search_range(haystack, needle, 0, haystack.len())
}

/// Non-overlapping occurrences of `needle` starting at or after `begin`
/// and ending at or before `end`.
pub fn search_range(haystack: &[u8], needle: &[u8], begin: usize, end: usize) -> Vec<usize> {
    let mut found = Vec::new();
    let end = end.min(haystack.len());
    if needle.is_empty() || begin >= end {
        return found;
    }

    let table = failure_table(needle);
    let mut m = begin;
    let mut i = 0usize;
    while m + i < end {
        if needle[i] == haystack[m + i] {
            if i == needle.len() - 1 {
                found.push(m);
                m += needle.len();
                i = 0;
            } else {
                i += 1;
            }
        } else {
            let back = table[i];
            m = (m as isize + i as isize - back) as usize;
            i = if back > -1 { back as usize } else { 0 };
        }
    }
    found
}

pub fn parse_hex(hex: &str) -> Result<Vec<u8>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() % 2 != 0 {
        return Err(RandomiserError::Config(format!(
            "hex string '{hex}' has an odd number of digits"
        )));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| {
                RandomiserError::Config(format!("'{}' is not a hex byte", &hex[i..i + 2]))
            })
        })
        .collect()
}

/// First match of a hex-encoded signature, if any.
pub fn find_hex(haystack: &[u8], hex: &str) -> Result<Option<usize>> {
    let needle = parse_hex(hex)?;
    Ok(search(haystack, &needle).first().copied())
}
