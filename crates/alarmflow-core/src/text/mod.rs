// ── OCR text normalization ──

mod filter;
mod replace;

pub use filter::{AlarmFilter, FilterVerdict};
pub use replace::ReplaceDictionary;
