//! Staged recovery of structured data from LLM replies.
//!
//! Replies that are supposed to be JSON arrive wrapped in markdown, cut off by
//! the token limit, or sprinkled with trailing commas and control bytes. This
//! crate turns such a reply into the most complete valid structure it can,
//! and never fails doing so:
//!
//! 1. [`unwrap_markdown`] - keep only the first fenced code block
//! 2. direct parse - well-behaved replies stop here
//! 3. [`repair_array`] - `[`...`]` slice with trailing-comma and truncation repair
//! 4. [`scan_records`] - string-aware brace counting, one record at a time
//! 5. [`object_span`] - outermost `{`...`}` span for single-object replies
//!
//! [`recover_array`] and [`recover_object`] report which stage succeeded so
//! callers can log it and notice model drift.

pub mod fence;
pub mod object;
pub mod pipeline;
pub mod repair;
pub mod sanitize;
pub mod scanner;

pub use fence::unwrap_markdown;
pub use object::object_span;
pub use pipeline::{
    extract_array, extract_object, extract_structured, recover_array, recover_object, Expect,
    Recovered, Stage,
};
pub use repair::repair_array;
pub use sanitize::{strip_control_chars, strip_trailing_commas};
pub use scanner::scan_records;
