//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the content sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate wires the host-provided bridge adapters into a single
//! [`CoreConfig`](config::CoreConfig) and establishes the logging conventions
//! (filters, PII redaction, host log forwarding) used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, FeatureFlags};
pub use error::{Error, Result};
