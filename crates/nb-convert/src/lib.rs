//! # nb-convert
//!
//! Conversion routing and format backends.
//!
//! This crate provides:
//!
//! - **Capabilities** ([`Capability`]) -- the conversion families the service
//!   offers (image, audio, video, ...).
//! - **Routing** ([`Dispatcher`], [`route`]) -- the pure support matrix from
//!   (source extension, target format) to a capability.
//! - **Availability** ([`CapabilityRegistry`]) -- which capabilities can run
//!   on this host, decided once at startup from tool discovery and config.
//! - **Tool discovery** ([`ToolRegistry`]) and **command execution**
//!   ([`ToolCommand`]) for ffmpeg and LibreOffice.
//! - **Conversion** ([`Converter`], [`SystemConverter`]) -- the byte
//!   transformation itself, dispatched to the backends in [`backends`].

pub mod backends;
pub mod capability;
pub mod command;
pub mod converter;
pub mod dispatcher;
pub mod registry;
pub mod tools;

// ---- Re-exports for convenience ----

pub use capability::Capability;
pub use command::{ToolCommand, ToolOutput};
pub use converter::{ConversionRequest, Converter, SystemConverter};
pub use dispatcher::{extension_of, route, Dispatcher, Route, SUPPORT_MATRIX};
pub use registry::{Availability, CapabilityInfo, CapabilityRegistry};
pub use tools::{ToolInfo, ToolRegistry};
