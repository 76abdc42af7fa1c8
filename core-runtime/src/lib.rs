//! # Core Runtime Module
//!
//! Foundational infrastructure shared by every core crate:
//! - Logging and tracing setup
//! - Bridge configuration with fail-fast validation
//! - The typed event bus
//!
//! ## Overview
//!
//! Nothing here knows about queues, transports or downloads. Those crates
//! emit [`events::CoreEvent`]s and log through `tracing`; this crate decides
//! where both end up.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
