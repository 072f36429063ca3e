use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;

pub const LABEL_CHAR_BUDGET: usize = 15;
const ELLIPSIS: &str = "...";

/// Shortens a title for display; the source string is left untouched.
pub fn truncate_title(title: &str, budget: usize) -> String {
    match title.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &title[..cut]),
        None => title.to_owned(),
    }
}

pub fn format_timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|timestamp| timestamp.format("%Y/%m/%d %H:%M").to_string())
        .unwrap_or_else(|| "---".to_owned())
}

/// Deterministic pseudo-random pair in `[-1, 1]` derived from an id.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}
