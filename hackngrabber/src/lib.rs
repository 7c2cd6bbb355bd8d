// Library interface for hackngrabber modules
// This allows tests and other binaries to import modules

pub mod app;
pub mod error;
pub mod extraction;
pub mod fetching;
pub mod fingerprint;
pub mod poller;
pub mod query;
pub mod server;
pub mod storage;
