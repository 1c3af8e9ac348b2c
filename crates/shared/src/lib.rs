//! Shared utilities and common types for the transit alarm engine.
//!
//! This crate provides functionality used across all other crates:
//! - Geographic coordinates and great-circle math
//! - Common field validation logic

pub mod geo_math;
pub mod validation;

pub use geo_math::Coordinate;
