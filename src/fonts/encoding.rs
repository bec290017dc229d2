//! Single-byte text encodings and glyph names

/// Unicode values for WinAnsi codes 0x80..=0x9F (0 = undefined)
const WIN_ANSI_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021,
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0, 0x017D, 0,
    0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014,
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Decode a WinAnsiEncoding byte
pub fn win_ansi_to_unicode(code: u8) -> Option<char> {
    match code {
        0x80..=0x9F => match WIN_ANSI_HIGH[(code - 0x80) as usize] {
            0 => None,
            u => char::from_u32(u as u32),
        },
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        _ => None,
    }
}

/// Encode a character as a WinAnsiEncoding byte, if representable
pub fn unicode_to_win_ansi(ch: char) -> Option<u8> {
    let u = ch as u32;
    match u {
        0x20..=0x7E | 0xA0..=0xFF => Some(u as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|&v| v != 0 && v as u32 == u)
            .map(|i| 0x80 + i as u8),
    }
}

/// Map an Adobe glyph name to its Unicode text
///
/// Covers the names WinAnsi fonts use in `/Differences` arrays, ligatures,
/// and the `uniXXXX` / `uXXXXX` forms.
pub fn glyph_name_to_unicode(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 {
            let mut out = String::new();
            for chunk in hex.as_bytes().chunks(4) {
                let s = std::str::from_utf8(chunk).ok()?;
                let u = u32::from_str_radix(s, 16).ok()?;
                out.push(char::from_u32(u)?);
            }
            return Some(out);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Ok(u) = u32::from_str_radix(hex, 16) {
                return char::from_u32(u).map(String::from);
            }
        }
    }

    // Single letters name themselves
    if name.len() == 1 && name.as_bytes()[0].is_ascii_alphabetic() {
        return Some(name.to_string());
    }

    let text = match name {
        "space" | "nbspace" => " ",
        "exclam" => "!",
        "quotedbl" => "\"",
        "numbersign" => "#",
        "dollar" => "$",
        "percent" => "%",
        "ampersand" => "&",
        "quotesingle" => "'",
        "parenleft" => "(",
        "parenright" => ")",
        "asterisk" => "*",
        "plus" => "+",
        "comma" => ",",
        "hyphen" | "sfthyphen" => "-",
        "period" => ".",
        "slash" => "/",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "colon" => ":",
        "semicolon" => ";",
        "less" => "<",
        "equal" => "=",
        "greater" => ">",
        "question" => "?",
        "at" => "@",
        "bracketleft" => "[",
        "backslash" => "\\",
        "bracketright" => "]",
        "asciicircum" => "^",
        "underscore" => "_",
        "grave" => "`",
        "braceleft" => "{",
        "bar" => "|",
        "braceright" => "}",
        "asciitilde" => "~",
        "quoteleft" => "\u{2018}",
        "quoteright" => "\u{2019}",
        "quotedblleft" => "\u{201C}",
        "quotedblright" => "\u{201D}",
        "quotesinglbase" => "\u{201A}",
        "quotedblbase" => "\u{201E}",
        "endash" => "\u{2013}",
        "emdash" => "\u{2014}",
        "bullet" => "\u{2022}",
        "ellipsis" => "\u{2026}",
        "dagger" => "\u{2020}",
        "daggerdbl" => "\u{2021}",
        "perthousand" => "\u{2030}",
        "trademark" => "\u{2122}",
        "minus" => "\u{2212}",
        "fi" => "fi",
        "fl" => "fl",
        "ff" => "ff",
        "ffi" => "ffi",
        "ffl" => "ffl",
        "copyright" => "\u{A9}",
        "registered" => "\u{AE}",
        "degree" => "\u{B0}",
        "section" => "\u{A7}",
        "paragraph" => "\u{B6}",
        "periodcentered" => "\u{B7}",
        "germandbls" => "\u{DF}",
        "multiply" => "\u{D7}",
        "divide" => "\u{F7}",
        "plusminus" => "\u{B1}",
        "mu" => "\u{B5}",
        "eacute" => "\u{E9}",
        "egrave" => "\u{E8}",
        "aacute" => "\u{E1}",
        "agrave" => "\u{E0}",
        "udieresis" => "\u{FC}",
        "odieresis" => "\u{F6}",
        "adieresis" => "\u{E4}",
        "ccedilla" => "\u{E7}",
        "Euro" => "\u{20AC}",
        _ => return None,
    };
    Some(text.to_string())
}
