//! Adapters for the hosted backend: auth, REST data and serverless functions.

mod dto;
mod http;
mod memory;

pub use self::http::{RemoteConfig, RemoteHttpClient, RemoteSetupError};
pub use self::memory::MemoryRemote;
