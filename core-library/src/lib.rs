//! # Library Module
//!
//! Catalog data model and listing for the remote media server.
//!
//! ## Overview
//!
//! This module provides:
//! - `Track` and `Album` models with tick-based durations
//! - The `CatalogClient` contract implemented by server connectors
//! - `CatalogBrowser`, which turns listing failures into empty results

pub mod catalog;
pub mod error;
pub mod models;

pub use catalog::{CatalogBrowser, CatalogClient};
pub use error::{LibraryError, Result};
pub use models::{Album, Ticks, Track, TICKS_PER_SECOND, UNKNOWN_ALBUM};
