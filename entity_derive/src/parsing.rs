//! Parsing utilities for entity, column and enum attributes
//!
//! This module handles the parsing of `#[entity]` and `#[column]` attributes
//! and validation of the identifiers they produce.

use convert_case::{Case, Casing};
use quote::quote;
use std::collections::HashSet;
use syn::{Attribute, Data, DataEnum, Error, Fields, Ident, LitStr, Result, Type};

/// Validate an identifier and return syn::Error for better proc macro error handling
pub fn validate_identifier_syn(kind: &str, name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid {} '{}': {}", kind, name, e)))
}

/// Validation logic that mirrors entity_store::validation
/// This ensures compile-time validation matches runtime validation
fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if name.len() > 63 {
        return Err(format!(
            "Name '{}' is too long: {} characters (max 63)",
            name,
            name.len()
        ));
    }

    let first_char = name
        .chars()
        .next()
        .ok_or_else(|| "Name cannot be empty".to_string())?;
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(format!(
            "Name '{}' must start with a letter or underscore",
            name
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("Name '{}' contains invalid characters: only alphanumeric characters and underscores are allowed", name));
    }

    if is_reserved_keyword(name) {
        return Err(format!("Name '{}' is a reserved SQL keyword", name));
    }

    Ok(())
}

/// Check if a name is a reserved SQL keyword
/// This mirrors the list in entity_store::validation
fn is_reserved_keyword(name: &str) -> bool {
    const RESERVED_KEYWORDS: &[&str] = &[
        "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "INNER", "LEFT",
        "RIGHT", "FULL", "OUTER", "ON", "AS", "AND", "OR", "NOT", "NULL", "TRUE", "FALSE",
        "CASE", "WHEN", "THEN", "ELSE", "END", "EXISTS", "IN", "LIKE", "BETWEEN", "ORDER",
        "BY", "GROUP", "HAVING", "LIMIT", "OFFSET", "UNION", "ALL", "DISTINCT", "CREATE",
        "DROP", "ALTER", "TABLE", "INDEX", "VIEW", "PRIMARY", "FOREIGN", "REFERENCES",
        "UNIQUE", "CHECK", "DEFAULT", "CONSTRAINT", "COLUMN", "SET", "VALUES", "INTO", "USER",
        "GRANT", "REVOKE", "BEGIN", "COMMIT", "ROLLBACK", "TRANSACTION",
    ];

    RESERVED_KEYWORDS.contains(&name.to_ascii_uppercase().as_str())
}

#[derive(Debug)]
pub struct EntityInfo {
    /// Name used by the default table naming convention
    pub type_name: String,
}

#[derive(Debug)]
pub struct FieldInfo {
    pub ident: Ident,
    pub ty: Type,
    /// Rust field name without raw identifier prefix
    pub name: String,
    pub column: String,
    /// Normalized type string, kept for diagnostics
    pub type_string: String,
}

#[derive(Debug)]
pub struct EnumInfo {
    pub variants: Vec<Ident>,
    /// Underlying column representation: "SmallInt", "Integer" or "BigInt"
    pub representation: &'static str,
}

fn unraw(ident: &Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}

/// Default column name: PascalCase of the field name, unless already capitalized
fn default_column_name(field_name: &str) -> String {
    if field_name.starts_with(|c: char| c.is_ascii_uppercase()) {
        field_name.to_string()
    } else {
        field_name.to_case(Case::Pascal)
    }
}

pub fn parse_entity_attributes(ident: &Ident, attrs: &[Attribute]) -> Result<EntityInfo> {
    let mut type_name = None;

    for attr in attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    type_name = Some((value.value(), value.span()));
                    Ok(())
                } else {
                    Err(meta.error("unsupported entity attribute, expected `name = \"...\"`"))
                }
            })?;
        }
    }

    let (type_name, span) = type_name.unwrap_or_else(|| (unraw(ident), ident.span()));
    validate_identifier_syn("entity name", &type_name, span)?;

    Ok(EntityInfo { type_name })
}

#[derive(Default)]
struct ColumnAttribute {
    name: Option<LitStr>,
    skip: bool,
}

fn parse_column_attribute(attrs: &[Attribute]) -> Result<ColumnAttribute> {
    let mut column = ColumnAttribute::default();

    for attr in attrs {
        if attr.path().is_ident("column") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    column.name = Some(meta.value()?.parse()?);
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    column.skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported column attribute, expected `name = \"...\"` or `skip`"))
                }
            })?;
        }
    }

    Ok(column)
}

pub fn parse_field_attributes(data: &Data) -> Result<Vec<FieldInfo>> {
    if let Data::Struct(data_struct) = data {
        if let Fields::Named(fields_named) = &data_struct.fields {
            let mut fields = Vec::new();
            let mut seen_columns = HashSet::new();

            for field in &fields_named.named {
                let ident = field
                    .ident
                    .as_ref()
                    .ok_or_else(|| Error::new_spanned(field, "Field must have a name"))?;

                let column_attr = parse_column_attribute(&field.attrs)?;
                if column_attr.skip {
                    continue;
                }

                let name = unraw(ident);
                let (column, span) = match &column_attr.name {
                    Some(lit) => (lit.value(), lit.span()),
                    None => (default_column_name(&name), ident.span()),
                };
                validate_identifier_syn("column name", &column, span)?;

                if !seen_columns.insert(column.to_ascii_lowercase()) {
                    return Err(Error::new(
                        span,
                        format!("Column '{}' is mapped by more than one field", column),
                    ));
                }

                let ty = &field.ty;
                let type_string = quote!(#ty).to_string().replace(' ', "");

                fields.push(FieldInfo {
                    ident: ident.clone(),
                    ty: field.ty.clone(),
                    name,
                    column,
                    type_string,
                });
            }

            return Ok(fields);
        }
    }

    Err(Error::new(
        proc_macro2::Span::call_site(),
        "Entity can only be derived for structs with named fields",
    ))
}

pub fn parse_enum(ident: &Ident, attrs: &[Attribute], data: &Data) -> Result<EnumInfo> {
    let DataEnum { variants, .. } = match data {
        Data::Enum(data_enum) => data_enum,
        _ => {
            return Err(Error::new(
                ident.span(),
                "SqlEnum can only be derived for enums",
            ))
        }
    };

    let mut idents = Vec::new();
    for variant in variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new_spanned(
                variant,
                "SqlEnum variants cannot carry fields",
            ));
        }
        idents.push(variant.ident.clone());
    }

    if idents.is_empty() {
        return Err(Error::new(
            ident.span(),
            "SqlEnum requires at least one variant",
        ));
    }

    let mut representation = "Integer";
    for attr in attrs {
        if attr.path().is_ident("repr") {
            attr.parse_nested_meta(|meta| {
                if let Some(repr) = meta.path.get_ident() {
                    representation = match repr.to_string().as_str() {
                        "i8" | "u8" | "i16" => "SmallInt",
                        "u16" | "i32" => "Integer",
                        "u32" | "i64" => "BigInt",
                        other => {
                            return Err(meta.error(format!(
                                "unsupported SqlEnum representation '{}'",
                                other
                            )))
                        }
                    };
                }
                Ok(())
            })?;
        }
    }

    Ok(EnumInfo {
        variants: idents,
        representation,
    })
}
