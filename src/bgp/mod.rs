//! Types and parsing for BGP messages.

pub mod aspath;
pub mod attribute_cache;
pub mod communities;
pub mod nlri;
pub mod path_attributes;
pub mod types;

pub mod message;
pub use crate::util::parser::ParseError;
