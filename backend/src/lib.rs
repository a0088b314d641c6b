// Crate root for the station ingest service modules.

pub mod app;
pub mod buffers;
pub mod config;
pub mod constants;
pub mod http;
pub mod model;
pub mod source;
pub mod tasks;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;
