// adforge - AI request orchestration for ad copy and voice generation
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod selector;
pub mod server;
pub mod utils;
