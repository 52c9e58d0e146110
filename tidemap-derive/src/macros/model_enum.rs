//! ModelEnum derive macro implementation

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

use crate::attributes;

pub fn derive_model_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let enum_ident = &input.ident;
    let name = attributes::extract_enum_name(&input.attrs)?
        .unwrap_or_else(|| enum_ident.to_string());

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            enum_ident,
            "ModelEnum can only be derived for enums",
        ));
    };

    let mut variants = Vec::new();
    let mut names = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "ModelEnum variants cannot carry fields",
            ));
        }
        variants.push(&variant.ident);
        names.push(LitStr::new(&variant.ident.to_string(), variant.ident.span()));
    }

    Ok(quote! {
        impl ::tidemap::ModelEnum for #enum_ident {
            const NAME: &'static str = #name;
            const VARIANTS: &'static [&'static str] = &[#(#names),*];

            fn variant_name(&self) -> &'static str {
                match self {
                    #(Self::#variants => #names,)*
                }
            }

            fn from_variant(name: &str) -> ::std::option::Option<Self> {
                match name {
                    #(#names => ::std::option::Option::Some(Self::#variants),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::tidemap::ValueType for #enum_ident {
            fn into_value(self) -> ::tidemap::sea_query::Value {
                ::tidemap::sea_query::Value::String(::std::option::Option::Some(
                    <Self as ::tidemap::ModelEnum>::variant_name(&self).to_string(),
                ))
            }

            fn null_value() -> ::tidemap::sea_query::Value {
                ::tidemap::sea_query::Value::String(::std::option::Option::None)
            }

            fn column_kind() -> ::tidemap::value::ColumnKind {
                ::tidemap::value::ColumnKind::Enum(<Self as ::tidemap::ModelEnum>::VARIANTS)
            }
        }

        impl ::tidemap::TryGetable for #enum_ident {
            fn try_get(
                value: ::tidemap::sea_query::Value,
            ) -> ::std::result::Result<Self, ::tidemap::value::ValueExtractionError> {
                match value {
                    ::tidemap::sea_query::Value::String(::std::option::Option::Some(s)) => {
                        <Self as ::tidemap::ModelEnum>::from_variant(&s).ok_or_else(|| {
                            ::tidemap::value::ValueExtractionError::ConversionError(format!(
                                "\"{}\" is not a variant of {}",
                                s, #name
                            ))
                        })
                    }
                    ::tidemap::sea_query::Value::String(::std::option::Option::None) => {
                        ::std::result::Result::Err(::tidemap::value::ValueExtractionError::NullValue)
                    }
                    other => ::std::result::Result::Err(
                        ::tidemap::value::ValueExtractionError::TypeMismatch {
                            expected: #name.to_string(),
                            actual: format!("{:?}", other),
                        },
                    ),
                }
            }
        }
    })
}
