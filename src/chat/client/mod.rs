//! Remote service adapters.

pub mod api;

pub use api::{ApiClient, ClientFuture, IngestClient, ProbeClient, QueryClient};
