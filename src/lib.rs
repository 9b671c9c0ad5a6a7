// Public API for integration tests and the binary

pub mod answer;
pub mod config;
pub mod contest;
pub mod content;
pub mod dispatch;
pub mod engine;
pub mod phone;
pub mod polling;
pub mod protocol;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod store;
pub mod survey;
pub mod transport;
pub mod types;
