//! Command dispatch: bridges CLI args to the engine, the store and output.

pub mod config_cmd;
pub mod operations;
pub mod run;
