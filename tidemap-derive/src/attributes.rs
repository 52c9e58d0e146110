//! Attribute parsing utilities

use syn::{Attribute, Expr, ExprLit, Field, Lit, LitBool, LitStr};

/// String value of a `#[name = "value"]` attribute
fn string_value(attr: &Attribute) -> syn::Result<String> {
    let meta = attr.meta.require_name_value()?;
    match &meta.value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

/// `#[flag]` or `#[flag = true|false]`
fn flag_value(attr: &Attribute) -> syn::Result<bool> {
    match &attr.meta {
        syn::Meta::Path(_) => Ok(true),
        syn::Meta::NameValue(meta) => match &meta.value {
            Expr::Lit(ExprLit {
                lit: Lit::Bool(b), ..
            }) => Ok(b.value),
            other => Err(syn::Error::new_spanned(other, "expected true or false")),
        },
        syn::Meta::List(list) => Err(syn::Error::new_spanned(list, "expected a flag")),
    }
}

/// Struct-level attributes of `#[derive(Entity)]`
#[derive(Default)]
pub struct TableAttributes {
    pub table_name: Option<String>,
    pub super_type: bool,
    pub sub_type_of: Option<String>,
    pub sub_types: Vec<String>,
    pub inherit_columns: Option<bool>,
    pub table_defaults: bool,
}

pub fn parse_table_attributes(attrs: &[Attribute]) -> syn::Result<TableAttributes> {
    let mut table = TableAttributes::default();
    for attr in attrs {
        let path = attr.path();
        if path.is_ident("table_name") {
            table.table_name = Some(string_value(attr)?);
        } else if path.is_ident("super_type") {
            table.super_type = flag_value(attr)?;
        } else if path.is_ident("sub_type_of") {
            table.sub_type_of = Some(string_value(attr)?);
        } else if path.is_ident("sub_types") {
            table.sub_types = string_value(attr)?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        } else if path.is_ident("inherit_columns") {
            table.inherit_columns = Some(flag_value(attr)?);
        } else if path.is_ident("table_defaults") {
            table.table_defaults = flag_value(attr)?;
        }
    }
    Ok(table)
}

/// Contents of `#[reference(cardinality, target = "...", ...)]`
#[derive(Default)]
pub struct ReferenceAttributes {
    pub cardinality: Option<String>,
    pub target: Option<String>,
    pub column: Option<String>,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
    pub foreign_right_column: Option<String>,
    pub nullable: Option<bool>,
}

const CARDINALITIES: [&str; 4] = ["one_to_one", "one_to_many", "many_to_one", "many_to_many"];

fn parse_reference(attr: &Attribute) -> syn::Result<ReferenceAttributes> {
    let mut reference = ReferenceAttributes::default();
    attr.parse_nested_meta(|meta| {
        if let Some(cardinality) = CARDINALITIES.iter().find(|c| meta.path.is_ident(c)) {
            reference.cardinality = Some(cardinality.to_string());
            return Ok(());
        }
        if meta.path.is_ident("nullable") {
            let value: LitBool = meta.value()?.parse()?;
            reference.nullable = Some(value.value);
            return Ok(());
        }
        let slot = if meta.path.is_ident("target") {
            &mut reference.target
        } else if meta.path.is_ident("column") {
            &mut reference.column
        } else if meta.path.is_ident("foreign_table") {
            &mut reference.foreign_table
        } else if meta.path.is_ident("foreign_column") {
            &mut reference.foreign_column
        } else if meta.path.is_ident("foreign_right_column") {
            &mut reference.foreign_right_column
        } else {
            return Err(meta.error("unsupported reference attribute"));
        };
        let value: LitStr = meta.value()?.parse()?;
        *slot = Some(value.value());
        Ok(())
    })?;
    if reference.cardinality.is_none() {
        return Err(syn::Error::new_spanned(
            attr,
            "reference needs a cardinality: one_to_one, one_to_many, many_to_one or many_to_many",
        ));
    }
    Ok(reference)
}

/// Field-level attributes of `#[derive(Entity)]`
#[derive(Default)]
pub struct ColumnAttributes {
    pub is_primary_key: bool,
    pub column_name: Option<String>,
    pub column_type: Option<String>,
    pub max_length: Option<u32>,
    pub is_nullable: bool,
    pub is_unique: bool,
    pub is_auto_increment: bool,
    pub default_value: Option<String>,
    pub column_extra: Option<String>,
    pub is_ignored: bool,
    pub reference: Option<ReferenceAttributes>,
}

pub fn parse_column_attributes(field: &Field) -> syn::Result<ColumnAttributes> {
    let mut attrs = ColumnAttributes::default();
    for attr in &field.attrs {
        let path = attr.path();
        if path.is_ident("primary_key") {
            attrs.is_primary_key = true;
        } else if path.is_ident("column_name") {
            attrs.column_name = Some(string_value(attr)?);
        } else if path.is_ident("column_type") {
            attrs.column_type = Some(string_value(attr)?);
        } else if path.is_ident("max_length") {
            let meta = attr.meta.require_name_value()?;
            match &meta.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Int(n), ..
                }) => attrs.max_length = Some(n.base10_parse()?),
                other => return Err(syn::Error::new_spanned(other, "expected an integer")),
            }
        } else if path.is_ident("nullable") {
            attrs.is_nullable = flag_value(attr)?;
        } else if path.is_ident("unique") {
            attrs.is_unique = flag_value(attr)?;
        } else if path.is_ident("auto_increment") {
            attrs.is_auto_increment = flag_value(attr)?;
        } else if path.is_ident("default_value") {
            attrs.default_value = Some(string_value(attr)?);
        } else if path.is_ident("column_extra") {
            attrs.column_extra = Some(string_value(attr)?);
        } else if path.is_ident("skip") {
            attrs.is_ignored = true;
        } else if path.is_ident("reference") {
            attrs.reference = Some(parse_reference(attr)?);
        }
    }
    Ok(attrs)
}

/// Value of `#[enum_name = "..."]` on an enum
pub fn extract_enum_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    for attr in attrs {
        if attr.path().is_ident("enum_name") {
            return string_value(attr).map(Some);
        }
    }
    Ok(None)
}
