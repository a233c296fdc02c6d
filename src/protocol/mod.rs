//! Console protocol for WebScreen communication.
//!
//! This module contains the text-level protocol pieces:
//! - Line framing of the raw byte stream
//! - Command lines understood by the device
//! - Directory listing grammars

pub mod command;
pub mod framer;
pub mod listing;

pub use command::{COMMAND_VERBS, DeviceCommand, END_SENTINEL, completions};
pub use framer::{LineFramer, Utf8Decoder};
pub use listing::{
    BracketedGrammar, ListingGrammar, ListingParser, TabularGrammar, parse_listing,
};
