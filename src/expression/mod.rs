mod pattern;

pub use pattern::{eval_like, eval_regex, escape_like};
