//! Code generation for the `Entity` trait
//!
//! The generated impl exposes a static field table plus index-based accessors,
//! so mapping code can walk fields without knowing the concrete type.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Generics, Ident};

use crate::parsing::{EntityInfo, FieldInfo};

pub fn generate_entity_impl(
    name: &Ident,
    generics: &Generics,
    entity_info: &EntityInfo,
    fields: &[FieldInfo],
) -> TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let type_name = &entity_info.type_name;

    let descriptors = fields.iter().map(|field| {
        let field_name = &field.name;
        let column = &field.column;
        let rust_type = &field.type_string;
        quote! {
            ::entity_store::FieldDescriptor::new(#field_name, #column, #rust_type)
        }
    });

    let read_arms = fields.iter().enumerate().map(|(index, field)| {
        let ident = &field.ident;
        quote! {
            #index => ::std::option::Option::Some(
                ::entity_store::type_mapping::ToSqlValue::normalize_for_write(&self.#ident)
            ),
        }
    });

    let null_arms = fields.iter().enumerate().map(|(index, field)| {
        let ident = &field.ident;
        quote! {
            #index => ::entity_store::type_mapping::ToSqlValue::is_missing(&self.#ident),
        }
    });

    let write_arms = fields.iter().enumerate().map(|(index, field)| {
        let ident = &field.ident;
        let ty = &field.ty;
        let field_name = &field.name;
        quote! {
            #index => {
                self.#ident = <#ty as ::entity_store::type_mapping::FromSqlValue>::from_sql_value(raw)
                    .map_err(|e| e.in_field(#field_name))?;
            }
        }
    });

    #[cfg(feature = "debug-logging")]
    eprintln!(
        "[entity_derive] {} -> {} columns",
        type_name,
        fields.len()
    );

    quote! {
        impl #impl_generics ::entity_store::Entity for #name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn fields() -> &'static [::entity_store::FieldDescriptor] {
                const FIELDS: &[::entity_store::FieldDescriptor] = &[
                    #(#descriptors),*
                ];
                FIELDS
            }

            fn field_value(&self, index: usize) -> ::std::option::Option<::entity_store::type_mapping::SqlValue> {
                match index {
                    #(#read_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn field_is_null(&self, index: usize) -> bool {
                match index {
                    #(#null_arms)*
                    _ => true,
                }
            }

            fn set_field(
                &mut self,
                index: usize,
                raw: ::std::option::Option<::entity_store::type_mapping::SqlValue>,
            ) -> ::std::result::Result<(), ::entity_store::type_mapping::CoercionError> {
                match index {
                    #(#write_arms)*
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }
        }
    }
}
