mod client;
mod error;
mod service;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::Error;
