//! Type-safe external command modules.
//!
//! Each struct implements `CommandArgs` for one external invocation and maps
//! its fields to the exact argv the tool expects.

pub mod aws;
pub mod build;
