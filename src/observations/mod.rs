pub mod cache;
pub mod error;
pub mod fetcher;
pub mod noaa_client;
pub mod partition;
pub mod source;
