//! Derive macro for mapping structs onto tables.
//!
//! This crate provides `#[derive(Record)]`, which implements
//! `oxide_dbmap::Record` from field annotations.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Type,
};

/// Annotation namespaces, in the order they are consulted.
const NAMESPACES: [&str; 2] = ["db", "gorp"];

/// Derives the `Record` trait for a struct with named fields.
///
/// # Field Attributes
///
/// - `#[db("...")]` - Mapping annotation, e.g.
///   `#[db("name: person_id, notnull, size: 64, index: by_person")]`
/// - `#[gorp("...")]` - Same grammar, consulted when no `db` annotation
///   is present
///
/// Recognized keys are `name`, `size`, `index`, `relation`, `notnull`,
/// `primarykey`, `autoincrement` and `unique`. A lone `-` or
/// `ignorefield` excludes the field. A `Vec` of records tagged
/// `relation: <foreign key>` becomes a one-to-many relation.
///
/// # Struct Attributes
///
/// - `#[record(hooks)]` - Routes lifecycle hooks to the struct's
///   `RecordHooks` implementation
///
/// The struct must implement `Default`; every persisted field type must
/// implement `ToSqlValue` and `FromSqlValue`.
#[proc_macro_derive(Record, attributes(db, gorp, record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_record_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_record_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();
    let hooks = parse_record_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(&input, "Record derive only supports structs"));
        }
    };

    let mut infos = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let tags = parse_tags(&field.attrs)?;
        let scan = scan_tag(&tags);
        let kind = classify(&field.ty);
        if scan.relation && !scan.ignored && !matches!(kind, FieldKind::Children(_)) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "relation fields must be a Vec of records",
            ));
        }
        infos.push(FieldInfo {
            ident,
            tags,
            kind,
            ignored: scan.ignored,
            relation: scan.relation,
        });
    }

    let field_defs = infos.iter().map(FieldInfo::field_def);

    let persisted: Vec<&FieldInfo> = infos.iter().filter(|f| f.is_persisted()).collect();
    let value_arms = persisted.iter().map(|f| {
        let ident = &f.ident;
        let name = ident.to_string();
        quote! {
            #name => ::core::option::Option::Some(
                ::oxide_dbmap::ToSqlValue::to_sql_value(&self.#ident),
            ),
        }
    });
    let set_arms = persisted.iter().map(|f| {
        let ident = &f.ident;
        let name = ident.to_string();
        quote! {
            #name => self.#ident = ::oxide_dbmap::FromSqlValue::from_sql_value(value)?,
        }
    });

    let relations: Vec<&FieldInfo> = infos.iter().filter(|f| f.child_type().is_some()).collect();
    let relations_impl = if relations.is_empty() {
        quote! {}
    } else {
        let names: Vec<String> = relations.iter().map(|f| f.ident.to_string()).collect();
        let idents: Vec<&Ident> = relations.iter().map(|f| &f.ident).collect();
        quote! {
            fn relations(
                &self,
            ) -> ::std::vec::Vec<(&'static str, &dyn ::oxide_dbmap::ChildCollection)> {
                ::std::vec![#(
                    (#names, &self.#idents as &dyn ::oxide_dbmap::ChildCollection)
                ),*]
            }

            fn relations_mut(
                &mut self,
            ) -> ::std::vec::Vec<(&'static str, &mut dyn ::oxide_dbmap::ChildCollection)> {
                ::std::vec![#(
                    (#names, &mut self.#idents as &mut dyn ::oxide_dbmap::ChildCollection)
                ),*]
            }
        }
    };

    let hooks_impl = if hooks {
        quote! {
            fn run_hook(&mut self, hook: ::oxide_dbmap::Hook) -> ::oxide_dbmap::HookResult {
                ::oxide_dbmap::RecordHooks::dispatch(self, hook)
            }
        }
    } else {
        quote! {}
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::oxide_dbmap::Record for #struct_name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn field_defs() -> ::std::vec::Vec<::oxide_dbmap::FieldDef> {
                ::std::vec![#(#field_defs),*]
            }

            #[allow(clippy::match_single_binding)]
            fn field_value(&self, field: &str) -> ::core::option::Option<::oxide_dbmap::SqlValue> {
                match field {
                    #(#value_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(clippy::match_single_binding, unused_variables)]
            fn set_field(
                &mut self,
                field: &str,
                value: ::oxide_dbmap::SqlValue,
            ) -> ::core::result::Result<(), ::oxide_dbmap::ConversionError> {
                match field {
                    #(#set_arms)*
                    other => {
                        return ::core::result::Result::Err(
                            ::oxide_dbmap::ConversionError::UnknownField(other.to_string()),
                        );
                    }
                }
                ::core::result::Result::Ok(())
            }

            #relations_impl

            #hooks_impl
        }
    })
}

/// How a field's Rust type maps onto a column.
enum FieldKind {
    /// A scalar column, with the `FieldType` variant to report.
    Scalar(&'static str),
    /// A `Vec` of records.
    Children(Type),
}

struct FieldInfo {
    ident: Ident,
    tags: Vec<(String, LitStr)>,
    kind: FieldKind,
    ignored: bool,
    relation: bool,
}

impl FieldInfo {
    fn is_persisted(&self) -> bool {
        !self.ignored && matches!(self.kind, FieldKind::Scalar(_))
    }

    fn child_type(&self) -> Option<&Type> {
        match &self.kind {
            FieldKind::Children(child) if self.relation && !self.ignored => Some(child),
            _ => None,
        }
    }

    fn field_def(&self) -> TokenStream2 {
        let name = self.ident.to_string();
        let variant = match &self.kind {
            FieldKind::Scalar(variant) => Ident::new(variant, proc_macro2::Span::call_site()),
            FieldKind::Children(_) => Ident::new("Children", proc_macro2::Span::call_site()),
        };
        let namespaces = self.tags.iter().map(|(ns, _)| ns);
        let values = self.tags.iter().map(|(_, tag)| tag);
        let child = self.child_type().map(|child| {
            quote! { .with_child(::oxide_dbmap::RecordRef::of::<#child>()) }
        });
        quote! {
            ::oxide_dbmap::FieldDef::new(#name, ::oxide_dbmap::FieldType::#variant)
                .with_tags(&[#((#namespaces, #values)),*])
                #child
        }
    }
}

/// What the compile-time scan of the selected annotation found.
struct TagScan {
    ignored: bool,
    relation: bool,
}

fn parse_record_attrs(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut hooks = false;
    for attr in attrs {
        if attr.path().is_ident("record") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("hooks") {
                    hooks = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported record attribute, expected `hooks`"))
                }
            })?;
        }
    }
    Ok(hooks)
}

fn parse_tags(attrs: &[Attribute]) -> syn::Result<Vec<(String, LitStr)>> {
    let mut tags = Vec::new();
    for attr in attrs {
        for namespace in NAMESPACES {
            if attr.path().is_ident(namespace) {
                let tag: LitStr = attr.parse_args()?;
                tags.push((namespace.to_string(), tag));
            }
        }
    }
    Ok(tags)
}

/// Mirrors the runtime namespace selection to decide which accessors
/// to generate.
fn scan_tag(tags: &[(String, LitStr)]) -> TagScan {
    let selected = NAMESPACES.iter().find_map(|namespace| {
        tags.iter()
            .map(|(ns, tag)| (ns, tag.value()))
            .find(|(ns, tag)| ns == namespace && !tag.trim().is_empty())
            .map(|(_, tag)| tag)
    });
    let mut scan = TagScan {
        ignored: false,
        relation: false,
    };
    let Some(tag) = selected else {
        return scan;
    };
    for segment in tag.split(',').map(str::trim) {
        if segment == "-" || segment.eq_ignore_ascii_case("ignorefield") {
            scan.ignored = true;
        }
        if let Some((key, _)) = segment.split_once(':') {
            if key.trim().eq_ignore_ascii_case("relation") {
                scan.relation = true;
            }
        }
    }
    scan
}

/// Only a bare `Vec` of non-bytes holds children; `Option<Vec<T>>` is
/// an ordinary column value.
fn classify(ty: &Type) -> FieldKind {
    if let Some(element) = vec_inner(ty) {
        if !is_bytes(element) {
            return FieldKind::Children(element.clone());
        }
    }
    let ty = option_inner(ty).unwrap_or(ty);
    if vec_inner(ty).is_some_and(is_bytes) {
        return FieldKind::Scalar("Bytes");
    }
    let variant = match last_ident(ty).as_deref() {
        Some("bool") => "Bool",
        Some("i8") => "Int8",
        Some("i16") => "Int16",
        Some("i32") => "Int32",
        Some("i64" | "isize") => "Int64",
        Some("u8") => "UInt8",
        Some("u16") => "UInt16",
        Some("u32") => "UInt32",
        Some("u64" | "usize") => "UInt64",
        Some("f32") => "Float32",
        Some("f64") => "Float64",
        Some("String") => "Text",
        Some("DateTime") => "Timestamp",
        _ => "Other",
    };
    FieldKind::Scalar(variant)
}

fn is_bytes(element: &Type) -> bool {
    last_ident(element).as_deref() == Some("u8")
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn option_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Option")
}

fn vec_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Vec")
}
