mod fs;
mod id;

pub(crate) use fs::*;
pub(crate) use id::{compare_years, format_numeric_id};
pub use id::normalize_id;
