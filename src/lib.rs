//! `mailscrub` cleans email messages before they leave your machine.
//!
//! This crate provides the core library for sanitizing a serialized
//! RFC 5322 message: stripping tracking headers, replacing the `Date`
//! header, rebuilding the MIME body, and appending an optional document
//! attachment.

pub mod cleaner;
pub mod compose;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
