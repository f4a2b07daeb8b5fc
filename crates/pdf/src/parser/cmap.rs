//! ToUnicode CMap parsing.
//!
//! Only the parts needed to map character codes to text are read:
//! `codespacerange` for the code width, and the `bfchar`/`bfrange` tables.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Code to Unicode mapping read from a font's `ToUnicode` stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToUnicodeMap {
    code_bytes: usize,
    entries: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
}

fn tokens(section: &str) -> Vec<Token> {
    static RE_TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = RE_TOKEN.get_or_init(|| Regex::new(r"<([0-9A-Fa-f\s]*)>|\[|\]").unwrap());

    re.captures_iter(section)
        .map(|caps| match caps.get(1) {
            Some(hex) => Token::Hex(parse_hex(hex.as_str())),
            None if &caps[0] == "[" => Token::Open,
            None => Token::Close,
        })
        .collect()
}

fn parse_hex(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .chars()
        .filter_map(|c| c.to_digit(16))
        .map(|d| d as u8)
        .collect();

    digits
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (*hi << 4) | *lo,
            [hi] => *hi << 4,
            _ => 0,
        })
        .collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| match c {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [lo] => u16::from(*lo),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Text between every `begin<name>` / `end<name>` pair.
fn sections<'a>(text: &'a str, name: &str) -> Vec<&'a str> {
    let begin = format!("begin{}", name);
    let end = format!("end{}", name);
    let mut out = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&begin) {
        let after = &rest[start + begin.len()..];
        match after.find(&end) {
            Some(stop) => {
                out.push(&after[..stop]);
                rest = &after[stop + end.len()..];
            }
            None => break,
        }
    }

    out
}

impl ToUnicodeMap {
    /// Parse a decompressed CMap stream. Returns `None` when it holds no
    /// mappings.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(data);
        let mut map = ToUnicodeMap::default();

        for section in sections(&text, "codespacerange") {
            if let Some(Token::Hex(lo)) = tokens(section).first() {
                map.code_bytes = map.code_bytes.max(lo.len());
            }
        }

        for section in sections(&text, "bfchar") {
            let toks = tokens(section);
            for pair in toks.chunks(2) {
                if let [Token::Hex(src), Token::Hex(dst)] = pair {
                    map.note_width(src.len());
                    map.entries.insert(code_value(src), utf16be(dst));
                }
            }
        }

        for section in sections(&text, "bfrange") {
            map.parse_ranges(&tokens(section));
        }

        if map.entries.is_empty() {
            return None;
        }
        if map.code_bytes == 0 {
            map.code_bytes = 2;
        }
        Some(map)
    }

    fn note_width(&mut self, len: usize) {
        if self.code_bytes == 0 {
            self.code_bytes = len;
        }
    }

    fn parse_ranges(&mut self, toks: &[Token]) {
        let mut i = 0;
        while i + 2 < toks.len() {
            let (Token::Hex(lo), Token::Hex(hi)) = (&toks[i], &toks[i + 1]) else {
                i += 1;
                continue;
            };
            self.note_width(lo.len());
            let (lo_code, hi_code) = (code_value(lo), code_value(hi));

            match &toks[i + 2] {
                Token::Hex(dst) => {
                    let base = utf16be(dst);
                    for (offset, code) in (lo_code..=hi_code).enumerate() {
                        self.entries.insert(code, offset_last_char(&base, offset as u32));
                    }
                    i += 3;
                }
                Token::Open => {
                    let mut j = i + 3;
                    let mut code = lo_code;
                    while let Some(Token::Hex(dst)) = toks.get(j) {
                        if code <= hi_code {
                            self.entries.insert(code, utf16be(dst));
                        }
                        code += 1;
                        j += 1;
                    }
                    // Skip the closing bracket.
                    i = j + 1;
                }
                Token::Close => i += 3,
            }
        }
    }

    /// Number of bytes per character code.
    pub fn code_bytes(&self) -> usize {
        self.code_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a string operand. Unmapped codes become U+FFFD, which the
    /// text cleanup removes.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let width = self.code_bytes.max(1);
        bytes
            .chunks(width)
            .map(|code| match self.entries.get(&code_value(code)) {
                Some(text) => text.clone(),
                None if width == 1 => char::from(code[0]).to_string(),
                None => '\u{FFFD}'.to_string(),
            })
            .collect()
    }
}

/// `base` with its last character advanced by `offset`, as `bfrange`
/// destinations are incremented.
fn offset_last_char(base: &str, offset: u32) -> String {
    let mut chars: Vec<char> = base.chars().collect();
    if let Some(last) = chars.last_mut() {
        if let Some(c) = char::from_u32(*last as u32 + offset) {
            *last = c;
        }
    }
    chars.into_iter().collect()
}
