//! Command line surface over the library

pub mod args;
pub mod output;
