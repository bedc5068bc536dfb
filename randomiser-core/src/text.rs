use std::collections::HashMap;

use crate::{RandomiserError, Result};

pub const GB_TERMINATOR: u8 = 0x50;
pub const GBA_TERMINATOR: u8 = 0xFF;
pub const GBA_VARIABLE_ESCAPE: u8 = 0xFD;

/// Byte <-> token mapping for one game's character set.
#[derive(Debug, Clone)]
pub struct TextTable {
    tokens: HashMap<u8, String>,
    bytes: HashMap<String, u8>,
    longest_token: usize,
    terminator: u8,
    variable_escape: Option<u8>,
}

impl TextTable {
    /// Parses `hexcode=token` lines. Blank lines and `#` comments are skipped.
    /// When two codes share a token the first one wins for encoding.
    pub fn parse(source: &str, terminator: u8) -> Result<Self> {
        let mut tokens = HashMap::new();
        let mut bytes = HashMap::new();
        let mut longest_token = 0;

        for (line_no, line) in source.lines().enumerate() {
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((code, token)) = line.split_once('=') else {
                return Err(RandomiserError::Config(format!(
                    "text table line {} has no '='",
                    line_no + 1
                )));
            };
            let code = u8::from_str_radix(code.trim(), 16).map_err(|_| {
                RandomiserError::Config(format!(
                    "text table line {} has bad hex code '{}'",
                    line_no + 1,
                    code
                ))
            })?;
            if token.is_empty() {
                continue;
            }
            let len = token.chars().count();
            longest_token = longest_token.max(len);
            tokens.insert(code, token.to_string());
            bytes.entry(token.to_string()).or_insert(code);
        }

        Ok(TextTable {
            tokens,
            bytes,
            longest_token,
            terminator,
            variable_escape: None,
        })
    }

    pub fn with_variable_escape(mut self, escape: u8) -> Self {
        self.variable_escape = Some(escape);
        self
    }

    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    /// Decodes up to the terminator (or the end of `data`).
    pub fn decode(&self, data: &[u8]) -> String {
        let mut out = String::new();
        let mut i = 0;
        while i < data.len() {
            let b = data[i];
            if b == self.terminator {
                break;
            }
            if Some(b) == self.variable_escape && i + 1 < data.len() {
                out.push_str(&format!("\\v{:02X}", data[i + 1]));
                i += 2;
                continue;
            }
            match self.tokens.get(&b) {
                Some(token) => out.push_str(token),
                None => out.push_str(&format!("\\x{b:02X}")),
            }
            i += 1;
        }
        out
    }

    /// Greedy longest-match encoding, without a terminator. Characters the
    /// table cannot express are dropped with a warning.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            if let Some(escaped) = self.escape_at(&chars, i) {
                out.extend_from_slice(&escaped);
                i += 4;
                continue;
            }

            let max_len = self.longest_token.min(chars.len() - i);
            let mut matched = false;
            for len in (1..=max_len).rev() {
                let candidate: String = chars[i..i + len].iter().collect();
                if let Some(&b) = self.bytes.get(&candidate) {
                    out.push(b);
                    i += len;
                    matched = true;
                    break;
                }
            }
            if !matched {
                log::warn!("text table has no code for {:?} in {text:?}, dropping it", chars[i]);
                i += 1;
            }
        }
        out
    }

    fn escape_at(&self, chars: &[char], i: usize) -> Option<Vec<u8>> {
        if i + 4 > chars.len() || chars[i] != '\\' {
            return None;
        }
        let hex: String = chars[i + 2..i + 4].iter().collect();
        let value = u8::from_str_radix(&hex, 16).ok()?;
        match (chars[i + 1], self.variable_escape) {
            ('x', _) => Some(vec![value]),
            ('v', Some(escape)) => Some(vec![escape, value]),
            _ => None,
        }
    }

    pub fn encode_terminated(&self, text: &str) -> Vec<u8> {
        let mut out = self.encode(text);
        out.push(self.terminator);
        out
    }

    /// Encodes into exactly `len` bytes. Long text is cut, short text is
    /// closed with the terminator and padded with `pad`.
    pub fn encode_fixed(&self, text: &str, len: usize, pad: u8) -> Vec<u8> {
        let mut out = self.encode(text);
        out.truncate(len);
        if out.len() < len {
            out.push(self.terminator);
        }
        out.resize(len, pad);
        out
    }

    pub fn encoded_length(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::{TextTable, GBA_TERMINATOR, GBA_VARIABLE_ESCAPE, GB_TERMINATOR};

    const TABLE: &str = "80=A\n81=B\n82=C\n# comment line\n\nE1=PK\nE2=MN\nE0='\nE4='d\n7F= \n";

    fn table() -> TextTable {
        TextTable::parse(TABLE, GB_TERMINATOR).unwrap()
    }

    #[test]
    fn decodes_until_terminator() {
        let t = table();
        assert_eq!(t.decode(&[0x80, 0x81, 0x7F, 0xE1, 0x50, 0x82]), "AB PK");
    }

    #[test]
    fn unmapped_bytes_become_escapes() {
        let t = table();
        assert_eq!(t.decode(&[0x80, 0x03]), "A\\x03");
        assert_eq!(t.encode("A\\x03"), vec![0x80, 0x03]);
    }

    #[test]
    fn encoding_prefers_longest_token() {
        let t = table();
        assert_eq!(t.encode("'dA"), vec![0xE4, 0x80]);
        assert_eq!(t.encode("'A"), vec![0xE0, 0x80]);
        assert_eq!(t.encode("PKMN"), vec![0xE1, 0xE2]);
    }

    #[test]
    fn round_trips_expressible_text() {
        let t = table();
        for s in ["ABC", "PK'd MN", "C'A B"] {
            assert_eq!(t.decode(&t.encode_terminated(s)), s);
        }
        assert_eq!(t.encoded_length("PKMN"), 2);
    }

    #[test]
    fn unmappable_characters_are_dropped_not_guessed() {
        let t = table();
        assert_eq!(t.encode("A?B"), vec![0x80, 0x81]);
        assert_eq!(t.encoded_length("A?B"), 2);
        assert_eq!(t.decode(&t.encode_terminated("A?B")), "AB");
    }

    #[test]
    fn fixed_length_pads_and_truncates() {
        let t = table();
        assert_eq!(t.encode_fixed("AB", 5, GB_TERMINATOR), vec![0x80, 0x81, 0x50, 0x50, 0x50]);
        assert_eq!(t.encode_fixed("ABCABC", 3, GB_TERMINATOR), vec![0x80, 0x81, 0x82]);
    }

    #[test]
    fn gba_variable_escape() {
        let t = TextTable::parse("BB=A\n", GBA_TERMINATOR)
            .unwrap()
            .with_variable_escape(GBA_VARIABLE_ESCAPE);
        assert_eq!(t.decode(&[0xBB, 0xFD, 0x01, 0xFF]), "A\\v01");
        assert_eq!(t.encode("A\\v01"), vec![0xBB, 0xFD, 0x01]);
        assert_eq!(t.encode_fixed("A", 4, 0), vec![0xBB, 0xFF, 0, 0]);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(TextTable::parse("80A\n", GB_TERMINATOR).is_err());
        assert!(TextTable::parse("G0=A\n", GB_TERMINATOR).is_err());
    }
}
