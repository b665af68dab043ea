//! Shell command parsing.

mod splitter;
mod tokenizer;
mod wrappers;

pub use splitter::split_raw;
pub use tokenizer::{ParseError, Segment, segment, tokenize, try_segment};
pub use wrappers::{Stripped, parse_assignment, strip_wrappers};
