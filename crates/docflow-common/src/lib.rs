//! Common utilities for docflow
//!
//! This crate provides the error taxonomy shared by every docflow connector.

pub mod error;

pub use error::{ConnectorError, DocumentError, Result};
