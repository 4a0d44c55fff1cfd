//! Code generation for the `SqlEnum` derive

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::Ident;

use crate::parsing::EnumInfo;

pub fn generate_sql_enum_impl(name: &Ident, info: &EnumInfo) -> TokenStream {
    let enum_name = name.to_string();
    let sql_type = Ident::new(info.representation, Span::call_site());
    let variants = &info.variants;

    quote! {
        impl ::entity_store::type_mapping::SqlEnum for #name {
            const NAME: &'static str = #enum_name;
            const SQL_TYPE: ::entity_store::type_mapping::SqlType =
                ::entity_store::type_mapping::SqlType::#sql_type;

            fn discriminant(&self) -> i64 {
                match self {
                    #(Self::#variants => Self::#variants as i64,)*
                }
            }

            fn from_discriminant(value: i64) -> ::std::option::Option<Self> {
                match value {
                    #(v if v == Self::#variants as i64 => ::std::option::Option::Some(Self::#variants),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::entity_store::type_mapping::FromSqlValue for #name {
            fn from_sql_value(
                raw: ::std::option::Option<::entity_store::type_mapping::SqlValue>,
            ) -> ::std::result::Result<Self, ::entity_store::type_mapping::CoercionError> {
                ::entity_store::type_mapping::enum_from_sql_value(raw)
            }
        }

        impl ::entity_store::type_mapping::ToSqlValue for #name {
            const SQL_TYPE: ::entity_store::type_mapping::SqlType =
                <Self as ::entity_store::type_mapping::SqlEnum>::SQL_TYPE;

            fn normalize_for_write(&self) -> ::entity_store::type_mapping::SqlValue {
                ::entity_store::type_mapping::enum_to_sql_value(self)
            }
        }
    }
}
