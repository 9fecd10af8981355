//! Slideshow Manager - fleet management for networked slideshow players
//!
//! This library provides the core functionality for managing slideshow
//! devices from one place:
//! - Device registry persisted to a single JSON file with atomic writes
//! - Per-call device gateway speaking each player's REST API
//! - Operator authentication (host identity or static table)
//! - HTTP API exposing registry and device operations
//! - Release branch lookup and self-update script runner
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               HTTP API  │  CLI                       │
//! └────────────────────┬────────────────────────────────┘
//!                      │ Operator
//! ┌────────────────────▼────────────────────────────────┐
//! │                 DeviceService                        │
//! │   Registry  │  HostPolicy  │  AuditLog               │
//! └────────────────────┬────────────────────────────────┘
//!                      │ one login + one request per call
//! ┌────────────────────▼────────────────────────────────┐
//! │        Slideshow devices (REST, session cookie)      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audit;
pub mod coerce;
pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod security;
pub mod service;
pub mod updates;

pub use audit::{AuditEntry, AuditLog};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{DeviceGateway, MediaPayload, PlaybackSettings, PlayerAction, SourceSpec};
pub use registry::{Device, DeviceRegistry, DeviceUpdate, NewDevice};
pub use security::{AuthMode, Authenticator, HostPolicy, Operator, OperatorAuth};
pub use service::{DeviceService, DeviceSummary};
pub use updates::{UpdateConfig, UpdateOutcome, Updater};
