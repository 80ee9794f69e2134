pub mod barcode;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod service;
pub mod types;

pub use service::{LookupResponse, ProductLookupService};
