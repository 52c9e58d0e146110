//! Utility functions for code generation

use syn::{GenericArgument, PathArguments, PathSegment, Type};

/// Last path segment of a type, `Related` for `tidemap::Related<User>`
pub fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

/// Whether the type's last path segment is `name`
pub fn is_named(ty: &Type, name: &str) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == name)
}

/// First generic type argument, `User` for `Related<User>`
pub fn first_generic(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if let PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

/// Extract the inner type from `Option<T>`
pub fn option_inner(ty: &Type) -> Option<&Type> {
    if is_named(ty, "Option") {
        first_generic(ty)
    } else {
        None
    }
}

/// `T` for `Option<T>`, the type itself otherwise
pub fn strip_option(ty: &Type) -> &Type {
    option_inner(ty).unwrap_or(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_generic() {
        let ty: Type = syn::parse_quote!(tidemap::Related<User>);
        assert!(is_named(&ty, "Related"));
        let inner = first_generic(&ty).map(|t| quote::quote!(#t).to_string());
        assert_eq!(inner.as_deref(), Some("User"));
    }

    #[test]
    fn test_strip_option() {
        let ty: Type = syn::parse_quote!(Option<Status>);
        let inner = strip_option(&ty);
        assert!(is_named(inner, "Status"));
        let plain: Type = syn::parse_quote!(String);
        assert!(is_named(strip_option(&plain), "String"));
    }
}
