pub mod client;
pub mod download;
pub mod links;
pub mod samples;
