//! The three pipeline stages: fetch, parse, save. Each is a worker pool
//! reading from one shared input channel and writing to one output channel.

pub mod fetch;
pub mod parse;
pub mod save;
