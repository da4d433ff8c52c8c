//! # sqlpilot Core
//!
//! Core types for the sqlpilot query workflow controller.
//!
//! This crate defines the data model shared by every other crate: the
//! message variants that make up a conversation, the closed set of
//! capabilities the generation service may request, and the error
//! taxonomy for the gateway, generation and workflow layers.

pub mod capability;
pub mod conversation;
pub mod errors;
pub mod message;

pub use capability::*;
pub use conversation::*;
pub use errors::*;
pub use message::*;
