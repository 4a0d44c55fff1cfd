//! Procedural macros for entity descriptors
//!
//! This crate provides the `Entity` derive, which replaces runtime reflection
//! with a generated field table, and the `SqlEnum` derive for integer-backed
//! enums stored by discriminant.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod entity_generation;
mod enum_generation;
mod parsing;

use entity_generation::generate_entity_impl;
use enum_generation::generate_sql_enum_impl;
use parsing::{parse_entity_attributes, parse_enum, parse_field_attributes};

/// Derive macro for the `Entity` trait
///
/// Every named field becomes a column. The column name defaults to the field
/// name in PascalCase; fields whose name already starts with an uppercase
/// letter keep it as written.
///
/// ```rust,ignore
/// use entity_store::Entity;
///
/// #[derive(Debug, Default, Entity)]
/// #[entity(name = "Student")]
/// pub struct Student {
///     #[column(name = "StudentID")]
///     pub id: i32,
///
///     pub student_name: String,
///
///     #[column(skip)]
///     pub cached_label: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let entity_info = match parse_entity_attributes(&input.ident, &input.attrs) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    let field_info = match parse_field_attributes(&input.data) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    TokenStream::from(generate_entity_impl(
        &input.ident,
        &input.generics,
        &entity_info,
        &field_info,
    ))
}

/// Derive macro for integer-backed enums
///
/// The column type follows the `#[repr]` of the enum (`i32` when absent).
/// The enum must also implement `Default`, which is used for NULL columns.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Default, SqlEnum)]
/// #[repr(i16)]
/// pub enum StudentType {
///     #[default]
///     Regular = 0,
///     Exchange = 1,
/// }
/// ```
#[proc_macro_derive(SqlEnum)]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let enum_info = match parse_enum(&input.ident, &input.attrs, &input.data) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    TokenStream::from(generate_sql_enum_impl(&input.ident, &enum_info))
}
