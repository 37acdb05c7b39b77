pub mod client;
pub mod error;

pub use client::{HistoryApiClient, HistoryApiConfig};
pub use error::TransportError;
