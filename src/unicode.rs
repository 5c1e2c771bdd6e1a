use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// A run of one or more `\uXXXX` escapes. Runs are decoded together so that
/// surrogate pairs split across two escapes come out as one character.
static ESCAPE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\\[uU][0-9a-fA-F]{4})+").expect("valid regex"));

/// Replaces literal `\uXXXX` escapes with the characters they name.
///
/// Text without escapes comes back untouched. An escape naming an unpaired
/// surrogate is left as written.
pub fn decode_unicode_escapes(input: &str) -> Cow<'_, str> {
    if !input.contains("\\u") && !input.contains("\\U") {
        return Cow::Borrowed(input);
    }
    ESCAPE_RUN.replace_all(input, |caps: &Captures| decode_run(&caps[0]))
}

fn decode_run(run: &str) -> String {
    // Every escape is exactly six ASCII bytes.
    let escapes: Vec<&str> = (0..run.len()).step_by(6).map(|i| &run[i..i + 6]).collect();
    let units: Vec<u16> = escapes
        .iter()
        .map(|e| u16::from_str_radix(&e[2..], 16).unwrap_or(0))
        .collect();

    let mut out = String::with_capacity(run.len());
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        match unit {
            0xD800..=0xDBFF if matches!(units.get(i + 1), Some(0xDC00..=0xDFFF)) => {
                let low = units[i + 1];
                let cp = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                match char::from_u32(cp) {
                    Some(c) => out.push(c),
                    None => {
                        out.push_str(escapes[i]);
                        out.push_str(escapes[i + 1]);
                    }
                }
                i += 2;
            }
            _ => {
                match char::from_u32(u32::from(unit)) {
                    Some(c) => out.push(c),
                    None => out.push_str(escapes[i]),
                }
                i += 1;
            }
        }
    }
    out
}
