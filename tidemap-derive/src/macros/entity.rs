//! Entity derive macro implementation
//!
//! Generates `Model`, `Entity` and typed setters for a struct with named fields. Each
//! field is classified by its type: `ChangeTracker` holds modifications, `Related<T>`
//! is a to-one relationship, `ModelCollection` a to-many relationship, any other type
//! carrying `#[reference]` an enum-valued reference, everything else a column.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Field, Fields, Ident, LitStr, Type};

use crate::attributes::{self, ColumnAttributes, ReferenceAttributes};
use crate::utils;

enum FieldKind<'a> {
    Column(ColumnAttributes),
    EnumReference {
        enum_ty: &'a Type,
        attrs: ColumnAttributes,
        reference: ReferenceAttributes,
    },
    ToOne {
        target: &'a Type,
        attrs: ColumnAttributes,
        reference: ReferenceAttributes,
    },
    ToMany {
        attrs: ColumnAttributes,
        reference: ReferenceAttributes,
    },
    Tracker,
    Ignored,
}

fn classify(field: &Field) -> syn::Result<FieldKind<'_>> {
    let mut attrs = attributes::parse_column_attributes(field)?;
    if attrs.is_ignored {
        return Ok(FieldKind::Ignored);
    }
    let ty = &field.ty;
    if utils::is_named(ty, "ChangeTracker") {
        return Ok(FieldKind::Tracker);
    }
    let reference = attrs.reference.take();
    if utils::is_named(ty, "Related") {
        let target = utils::first_generic(ty)
            .ok_or_else(|| syn::Error::new_spanned(ty, "Related needs a target type"))?;
        let reference = reference.ok_or_else(|| {
            syn::Error::new_spanned(field, "Related fields need #[reference(one_to_one)] or #[reference(one_to_many)]")
        })?;
        if !is_to_one(&reference) {
            return Err(syn::Error::new_spanned(
                field,
                "Related fields take a one_to_one or one_to_many reference",
            ));
        }
        return Ok(FieldKind::ToOne {
            target,
            attrs,
            reference,
        });
    }
    if utils::is_named(ty, "ModelCollection") {
        let reference = reference.ok_or_else(|| {
            syn::Error::new_spanned(field, "ModelCollection fields need #[reference(many_to_one|many_to_many, target = \"...\")]")
        })?;
        if is_to_one(&reference) {
            return Err(syn::Error::new_spanned(
                field,
                "ModelCollection fields take a many_to_one or many_to_many reference",
            ));
        }
        if reference.target.is_none() {
            return Err(syn::Error::new_spanned(field, "collection reference needs a target"));
        }
        return Ok(FieldKind::ToMany { attrs, reference });
    }
    match reference {
        Some(reference) => {
            if !is_to_one(&reference) {
                return Err(syn::Error::new_spanned(
                    field,
                    "enum-valued references take a one_to_one or one_to_many reference",
                ));
            }
            Ok(FieldKind::EnumReference {
                enum_ty: utils::strip_option(ty),
                attrs,
                reference,
            })
        }
        None => Ok(FieldKind::Column(attrs)),
    }
}

fn is_to_one(reference: &ReferenceAttributes) -> bool {
    matches!(
        reference.cardinality.as_deref(),
        Some("one_to_one") | Some("one_to_many")
    )
}

fn cardinality_tokens(reference: &ReferenceAttributes) -> TokenStream2 {
    match reference.cardinality.as_deref() {
        Some("one_to_one") => quote! { ::tidemap::Cardinality::OneToOne },
        Some("one_to_many") => quote! { ::tidemap::Cardinality::OneToMany },
        Some("many_to_one") => quote! { ::tidemap::Cardinality::ManyToOne },
        _ => quote! { ::tidemap::Cardinality::ManyToMany },
    }
}

/// `def.column::<T>("p")` with one chained setter per declared attribute
fn describe_column(property: &LitStr, ty: &Type, attrs: &ColumnAttributes) -> TokenStream2 {
    let mut chain = Vec::new();
    if let Some(name) = &attrs.column_name {
        chain.push(quote! { .name(#name) });
    }
    if let Some(column_type) = &attrs.column_type {
        chain.push(quote! { .column_type(#column_type) });
    }
    if let Some(length) = attrs.max_length {
        chain.push(quote! { .max_length(#length) });
    }
    if attrs.is_nullable {
        chain.push(quote! { .nullable() });
    }
    if attrs.is_primary_key {
        chain.push(quote! { .primary_key() });
    }
    if attrs.is_unique {
        chain.push(quote! { .unique() });
    }
    if attrs.is_auto_increment {
        chain.push(quote! { .auto_increment() });
    }
    if let Some(default) = &attrs.default_value {
        chain.push(quote! { .default_value(::tidemap::schema::DefaultValue::parse(#default)) });
    }
    if let Some(extra) = &attrs.column_extra {
        chain.push(quote! { .extra(#extra) });
    }
    quote! {
        def.column::<#ty>(#property) #(#chain)*;
    }
}

fn describe_reference(
    property: &LitStr,
    target: TokenStream2,
    attrs: &ColumnAttributes,
    reference: &ReferenceAttributes,
    nullable_fallback: Option<TokenStream2>,
) -> TokenStream2 {
    let cardinality = cardinality_tokens(reference);
    let mut chain = Vec::new();
    let column = reference.column.as_ref().or(attrs.column_name.as_ref());
    if let Some(column) = column {
        chain.push(quote! { .column(#column) });
    }
    if let Some(table) = &reference.foreign_table {
        chain.push(quote! { .foreign_table(#table) });
    }
    if let Some(foreign) = &reference.foreign_column {
        chain.push(quote! { .foreign_column(#foreign) });
    }
    if let Some(right) = &reference.foreign_right_column {
        chain.push(quote! { .foreign_right_column(#right) });
    }
    match (reference.nullable, attrs.is_nullable, nullable_fallback) {
        (Some(nullable), _, _) => chain.push(quote! { .nullable(#nullable) }),
        (None, true, _) => chain.push(quote! { .nullable(true) }),
        (None, false, Some(fallback)) => chain.push(quote! { .nullable(#fallback) }),
        (None, false, None) => {}
    }
    quote! {
        def.reference(#property, #cardinality, #target) #(#chain)*;
    }
}

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let entity_name = LitStr::new(&struct_name.to_string(), struct_name.span());
    let table = attributes::parse_table_attributes(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Entity can only be derived for structs with named fields",
            ))
        }
    };

    let mut tracker: Option<&Ident> = None;
    let mut describe = Vec::new();
    let mut get_arms = Vec::new();
    let mut set_arms = Vec::new();
    let mut related_arms = Vec::new();
    let mut related_mut_arms = Vec::new();
    let mut collection_arms = Vec::new();
    let mut collection_mut_arms = Vec::new();
    let mut id_parts = Vec::new();
    let mut json_entries = Vec::new();
    let mut blank_fields = Vec::new();
    let mut setters = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let property = LitStr::new(&ident.to_string(), ident.span());
        let setter = format_ident!("set_{}", ident);
        blank_fields.push(quote! { #ident: ::std::default::Default::default() });

        // Shared by columns and enum-valued references
        let value_access = |ty: &Type| {
            (
                quote! {
                    #property => ::std::option::Option::Some(
                        ::tidemap::ValueType::into_value(::std::clone::Clone::clone(&self.#ident))
                    ),
                },
                quote! {
                    #property => {
                        self.#ident = <#ty as ::tidemap::TryGetable>::try_get(value).map_err(|e| {
                            ::tidemap::MapperError::coercion(#entity_name, #property, e.to_string())
                        })?;
                        ::std::result::Result::Ok(())
                    }
                },
                quote! {
                    map.insert(
                        #property.to_string(),
                        ::tidemap::value::value_to_json(&::tidemap::ValueType::into_value(
                            ::std::clone::Clone::clone(&self.#ident),
                        )),
                    );
                },
            )
        };

        match classify(field)? {
            FieldKind::Ignored => {}
            FieldKind::Tracker => {
                if tracker.is_some() {
                    return Err(syn::Error::new_spanned(
                        field,
                        "Entity structs take exactly one ChangeTracker field",
                    ));
                }
                tracker = Some(ident);
            }
            FieldKind::Column(attrs) => {
                describe.push(describe_column(&property, ty, &attrs));
                if attrs.is_primary_key {
                    id_parts.push(quote! {
                        ::tidemap::ValueType::into_value(::std::clone::Clone::clone(&self.#ident))
                    });
                }
                let (get, set, json) = value_access(ty);
                get_arms.push(get);
                set_arms.push(set);
                json_entries.push(json);
                setters.push((setter, ident, quote! { #ty }, property.clone(), false));
            }
            FieldKind::EnumReference {
                enum_ty,
                attrs,
                reference,
            } => {
                let target = quote! { <#enum_ty as ::tidemap::ModelEnum>::NAME };
                let nullable = utils::option_inner(ty).is_some();
                describe.push(describe_reference(
                    &property,
                    target,
                    &attrs,
                    &reference,
                    Some(quote! { #nullable }),
                ));
                let (get, set, json) = value_access(ty);
                get_arms.push(get);
                set_arms.push(set);
                json_entries.push(json);
                setters.push((setter, ident, quote! { #ty }, property.clone(), false));
            }
            FieldKind::ToOne {
                target,
                attrs,
                reference,
            } => {
                let target_name = quote! { <#target as ::tidemap::Entity>::NAME };
                describe.push(describe_reference(&property, target_name, &attrs, &reference, None));
                related_arms.push(quote! {
                    #property => ::std::option::Option::Some(&self.#ident as &dyn ::tidemap::RelatedSlot),
                });
                related_mut_arms.push(quote! {
                    #property => ::std::option::Option::Some(&mut self.#ident as &mut dyn ::tidemap::RelatedSlot),
                });
                setters.push((
                    setter,
                    ident,
                    quote! { ::std::option::Option<::std::rc::Rc<::std::cell::RefCell<#target>>> },
                    property.clone(),
                    true,
                ));
            }
            FieldKind::ToMany { attrs, reference } => {
                let target = reference.target.clone().unwrap_or_default();
                describe.push(describe_reference(
                    &property,
                    quote! { #target },
                    &attrs,
                    &reference,
                    None,
                ));
                collection_arms.push(quote! {
                    #property => ::std::option::Option::Some(&self.#ident),
                });
                collection_mut_arms.push(quote! {
                    #property => ::std::option::Option::Some(&mut self.#ident),
                });
            }
        }
    }

    let tracker = tracker.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Entity structs need a ChangeTracker field",
        )
    })?;

    let mut table_describe = Vec::new();
    if let Some(name) = &table.table_name {
        table_describe.push(quote! { def.table_name(#name); });
    }
    if table.super_type {
        table_describe.push(quote! { def.super_type(); });
    }
    if let Some(parent) = &table.sub_type_of {
        table_describe.push(quote! { def.sub_type_of(#parent); });
    }
    if !table.sub_types.is_empty() {
        let subs = &table.sub_types;
        table_describe.push(quote! { def.sub_types(&[#(#subs),*]); });
    }
    if let Some(inherit) = table.inherit_columns {
        table_describe.push(quote! { def.inherit_columns(#inherit); });
    }
    let defaults = table.table_defaults.then(|| {
        quote! {
            let defaults = <Self as ::std::default::Default>::default();
            def.defaults_from(&defaults);
        }
    });

    let setter_fns = setters
        .iter()
        .map(|(setter, ident, ty, property, is_related)| {
            let assign = if *is_related {
                quote! { self.#ident.set(value); }
            } else {
                quote! { self.#ident = value; }
            };
            quote! {
                pub fn #setter(&mut self, value: #ty) {
                    #assign
                    self.#tracker.mark_modified(#property);
                }
            }
        });

    Ok(quote! {
        impl ::tidemap::Model for #struct_name {
            fn entity_name(&self) -> &'static str {
                #entity_name
            }

            fn get(&self, property: &str) -> ::std::option::Option<::tidemap::sea_query::Value> {
                match property {
                    #(#get_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set(
                &mut self,
                property: &str,
                value: ::tidemap::sea_query::Value,
            ) -> ::tidemap::MapperResult<()> {
                match property {
                    #(#set_arms)*
                    other => ::std::result::Result::Err(::tidemap::MapperError::coercion(
                        #entity_name,
                        other,
                        "unknown property",
                    )),
                }
            }

            fn related(&self, property: &str) -> ::std::option::Option<&dyn ::tidemap::RelatedSlot> {
                match property {
                    #(#related_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn related_mut(
                &mut self,
                property: &str,
            ) -> ::std::option::Option<&mut dyn ::tidemap::RelatedSlot> {
                match property {
                    #(#related_mut_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn collection(&self, property: &str) -> ::std::option::Option<&::tidemap::ModelCollection> {
                match property {
                    #(#collection_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn collection_mut(
                &mut self,
                property: &str,
            ) -> ::std::option::Option<&mut ::tidemap::ModelCollection> {
                match property {
                    #(#collection_mut_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn tracker(&self) -> &::tidemap::ChangeTracker {
                &self.#tracker
            }

            fn tracker_mut(&mut self) -> &mut ::tidemap::ChangeTracker {
                &mut self.#tracker
            }

            fn model_id(&self) -> ::tidemap::ModelId {
                ::tidemap::ModelId::new(vec![#(#id_parts),*])
            }

            fn to_json(&self) -> ::tidemap::serde_json::Value {
                let mut map = ::tidemap::serde_json::Map::new();
                #(#json_entries)*
                ::tidemap::serde_json::Value::Object(map)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        impl ::tidemap::Entity for #struct_name {
            const NAME: &'static str = #entity_name;

            fn describe(def: &mut ::tidemap::TableDefinition) {
                #(#table_describe)*
                #(#describe)*
                #defaults
            }

            fn blank() -> Self {
                Self {
                    #(#blank_fields),*
                }
            }
        }

        impl #struct_name {
            #(#setter_fns)*
        }
    })
}
