//! Data types for WebScreen devices.
//!
//! This module contains the core data structures used throughout the library:
//! - Connection state and port identity
//! - Directory listing entries

pub mod device;
pub mod entry;

pub use device::{ConnectionState, DeviceInfo, PortInfo};
pub use entry::{EntryKind, FileEntry};
