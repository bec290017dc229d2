//! ToUnicode CMap parsing
//!
//! Only the `bfchar` and `bfrange` sections matter for text extraction.
//! Malformed entries are skipped rather than failing the whole map.

use std::collections::HashMap;

/// Character code to Unicode text
#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    mappings: HashMap<u32, String>,
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut mappings = HashMap::new();

        for section in sections(&text, "beginbfchar", "endbfchar") {
            let tokens = hex_tokens(section);
            for pair in tokens.chunks_exact(2) {
                if let (Some(code), Some(unicode)) = (parse_code(pair[0]), decode_utf16be(pair[1])) {
                    mappings.insert(code, unicode);
                }
            }
        }

        for section in sections(&text, "beginbfrange", "endbfrange") {
            parse_bfrange(section, &mut mappings);
        }

        Self { mappings }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Bodies of all `begin ... end` sections
fn sections<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        let Some(stop) = body.find(end) else { break };
        found.push(&body[..stop]);
        rest = &body[stop + end.len()..];
    }
    found
}

/// All `<hex>` tokens in order
fn hex_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start + 1..].find('>') else { break };
        tokens.push(rest[start + 1..start + 1 + len].trim());
        rest = &rest[start + 1 + len + 1..];
    }
    tokens
}

fn parse_code(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok()
}

fn decode_utf16be(hex: &str) -> Option<String> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() == 2 {
        return parse_code(&hex).and_then(char::from_u32).map(String::from);
    }
    if hex.is_empty() || hex.len() % 4 != 0 {
        return None;
    }
    let units = hex
        .as_bytes()
        .chunks(4)
        .map(|c| std::str::from_utf8(c).ok().and_then(|s| u16::from_str_radix(s, 16).ok()))
        .collect::<Option<Vec<u16>>>()?;
    String::from_utf16(&units).ok()
}

/// `<lo> <hi> <dst>` or `<lo> <hi> [<dst0> <dst1> ...]`, one entry per line
fn parse_bfrange(section: &str, mappings: &mut HashMap<u32, String>) {
    let mut rest = section;
    loop {
        let tokens = hex_tokens_prefix(rest, 2);
        let Some((lo, hi, after)) = tokens else { break };
        let (Some(lo), Some(hi)) = (parse_code(lo), parse_code(hi)) else { break };
        if hi < lo {
            break;
        }
        let after = after.trim_start();

        if let Some(array) = after.strip_prefix('[') {
            let Some(close) = array.find(']') else { break };
            for (i, dst) in hex_tokens(&array[..close]).into_iter().enumerate() {
                let Some(code) = lo.checked_add(i as u32) else { break };
                if code > hi {
                    break;
                }
                if let Some(unicode) = decode_utf16be(dst) {
                    mappings.insert(code, unicode);
                }
            }
            rest = &array[close + 1..];
        } else {
            let Some((dst, after_dst)) = hex_tokens_prefix(after, 1).map(|(d, _, r)| (d, r)) else {
                break;
            };
            if let Some(start) = decode_utf16be(dst) {
                for offset in 0..=(hi - lo).min(0xFFFF) {
                    if let Some(unicode) = increment_last(&start, offset) {
                        mappings.insert(lo + offset, unicode);
                    }
                }
            }
            rest = after_dst;
        }
    }
}

/// Take the next `count` hex tokens (1 or 2) and the remaining text
fn hex_tokens_prefix(text: &str, count: usize) -> Option<(&str, &str, &str)> {
    let mut rest = text;
    let mut found = Vec::with_capacity(count);
    for _ in 0..count {
        let start = rest.find('<')?;
        // A '[' before the next token belongs to an array destination
        if rest[..start].contains('[') {
            return None;
        }
        let len = rest[start + 1..].find('>')?;
        found.push(rest[start + 1..start + 1 + len].trim());
        rest = &rest[start + 1 + len + 1..];
    }
    match found[..] {
        [a] => Some((a, "", rest)),
        [a, b] => Some((a, b, rest)),
        _ => None,
    }
}

/// Add `offset` to the last character of `start`
fn increment_last(start: &str, offset: u32) -> Option<String> {
    let mut chars: Vec<char> = start.chars().collect();
    let last = chars.pop()?;
    chars.push(char::from_u32(last as u32 + offset)?);
    Some(chars.into_iter().collect())
}
