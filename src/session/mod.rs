//! Transcription session management
//!
//! This module provides the `TranscriptionManager` that manages:
//! - Provider stream lifecycle per client connection
//! - Audio routing and transcript accumulation
//! - Silent reconnect on the provider's stream duration limit
//! - Visible recovery from provider failures
//! - Exactly-once delivery of the final transcript

mod config;
mod context;
mod manager;
mod recovery;
mod registry;

pub use config::SessionConfig;
pub use context::{SessionContext, SessionId};
pub use manager::TranscriptionManager;
pub use registry::{RecoveryGuard, SessionRegistry};
