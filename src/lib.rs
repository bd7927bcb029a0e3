pub mod assign;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod distribute;
pub mod export;
pub mod import;
pub mod people;
pub mod playlist;
pub mod sheet;
pub mod store;

/// Application name for XDG paths
pub const APP_NAME: &str = "sheetstand";

/// Characters Windows refuses in file names. Distribution folders are often
/// synced to shared drives, so they are avoided on every platform.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace characters that are invalid in a file name with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_FILE_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}
