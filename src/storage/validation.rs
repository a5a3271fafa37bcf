//! Filename validation
//!
//! Clients may only name files directly inside the served directory. A name
//! is accepted when it is built from an allow-list of characters and is not
//! one of the special entries `.` and `..`; since `/` and `\` are outside
//! the allow-list, no accepted name can leave the root.

/// Longest filename accepted from a client.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Returns true if `c` may appear in a client-supplied filename.
#[inline]
pub fn is_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Returns true if `name` is safe to resolve against the served root.
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_FILENAME_LENGTH
        && name != "."
        && name != ".."
        && name.chars().all(is_filename_char)
}
