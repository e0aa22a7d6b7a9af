//! MPD preprocessing library - shared modules for the `mpd-prep` binary and tests.

pub mod challenge;
pub mod cold_start;
pub mod corpus;
pub mod errors;
pub mod extract;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod progress;
pub mod remap;
pub mod safety;
pub mod settings;
pub mod table;
