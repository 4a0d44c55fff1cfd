//! Convenience re-exports for common DataHaus usage
//!
//! # Example
//!
//! ```rust
//! use datahaus::prelude::*;
//!
//! // Now you have access to all the common DataHaus types and traits
//! ```

// Core DataHaus components
pub use crate::core::DataHaus;
pub use crate::errors::DataHausError;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, MappingConfig};

// Re-export commonly used entity-store types for convenience
pub use entity_store::prelude::*;

// School domain
pub use crate::school::{Class, Course, School, Student, StudentType};

// Common external dependencies
pub use anyhow;
pub use async_trait::async_trait;
pub use sqlx;
pub use tokio;
