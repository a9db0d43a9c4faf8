//! Word ⇄ code-point conversion and the binary store format.

mod format;

pub use format::{
    decode, encode, flush_file, open_file, read_file, write_file, HEADER_SIZE, MAGIC,
};

/// Split a string into Unicode scalar values.
pub fn to_code_points(word: &str) -> Vec<u32> {
    word.chars().map(u32::from).collect()
}

/// Join code points back into a string, skipping values that are not scalars.
pub fn from_code_points(code_points: &[u32]) -> String {
    code_points
        .iter()
        .filter_map(|&cp| char::from_u32(cp))
        .collect()
}

/// Simple lowercase mapping for a single code point; multi-char mappings are left as is.
pub fn to_lower(cp: u32) -> u32 {
    let Some(c) = char::from_u32(cp) else {
        return cp;
    };
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => u32::from(l),
        _ => cp,
    }
}

/// Case-insensitive code point comparison used when matching typed keys.
pub fn eq_ignore_case(a: u32, b: u32) -> bool {
    a == b || to_lower(a) == to_lower(b)
}
