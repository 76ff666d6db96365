//! Pure Rust async implementation of the [Source A2S_INFO Query Protocol](https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO)
//! with split-packet reassembly, plus the status-polling and presence
//! layers that turn query results into presence lines on a schedule.
pub mod cftools;
pub mod config;
pub mod error;
pub mod info;
pub mod packet;
mod parse;
pub mod presence;
pub mod provider;
pub mod query;
pub mod status;
pub mod updater;
