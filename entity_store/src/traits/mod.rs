//! Traits implemented by mapped types

pub mod entity;

pub use entity::{Entity, FieldDescriptor};
