pub mod client;

pub use client::{BackendClient, ContentPayload, PartPayload, RunRequest, TransportError};
