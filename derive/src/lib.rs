extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields};

/// Field attributes parsed from `#[igbinary(...)]` annotations
///
/// # Fields
///
/// * `rename` - Wire name to use instead of the Rust field name
/// * `skip` - Whether the field is left out of the schema entirely
#[derive(Debug, Clone, Default)]
struct FieldAttributes {
    rename: Option<String>,
    skip: bool,
}

/// Extract and parse `#[igbinary(...)]` attribute values from field attributes
///
/// # Supported Attributes
///
/// * `#[igbinary(rename="name")]` - Wire name of the field
/// * `#[igbinary(skip)]` - Neither encode nor decode this field
///
/// Both can be combined: `#[igbinary(rename="a", skip)]`.
fn get_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttributes> {
    let mut parsed = FieldAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("igbinary") {
            continue;
        }
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident = input.parse::<syn::Ident>()?;

                if ident == "rename" {
                    input.parse::<syn::Token![=]>()?;
                    let lit_str = input.parse::<syn::LitStr>()?;
                    if lit_str.value().is_empty() {
                        return Err(syn::Error::new(
                            lit_str.span(),
                            "Field name must not be empty",
                        ));
                    }
                    parsed.rename = Some(lit_str.value());
                } else if ident == "skip" {
                    parsed.skip = true;
                } else {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("Unknown attribute: {}", ident),
                    ));
                }

                // Consume comma if present, otherwise end
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                }
            }
            Ok(())
        })?;
    }

    Ok(parsed)
}

/// Derive macro for implementing the `Record` and `Value` traits
///
/// Generates the field schema of a struct with named fields. Fields are listed in
/// declaration order, each under its wire name: the `rename` attribute if present,
/// otherwise the field identifier (without any `r#` prefix). The struct must also
/// implement `Default`.
///
/// # Supported Attributes
///
/// * `#[igbinary(rename="name")]` - Use the given wire name
/// * `#[igbinary(skip)]` - Leave the field out of the schema
///
/// # Panics
///
/// Two fields resolving to the same wire name are rejected at compile time.
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Record, Default)]
/// struct MyStruct {
///     #[igbinary(rename="ID")]
///     id: i32,
///     #[igbinary(skip)]
///     cache: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(igbinary))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => fields,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Record can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Record can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut field_defs = Vec::new();
    let mut used_names = HashSet::new();
    for f in &fields.named {
        let Some(field_ident) = &f.ident else {
            continue;
        };
        let field_attrs = match get_field_attributes(&f.attrs) {
            Ok(attrs) => attrs,
            Err(err) => return err.to_compile_error().into(),
        };
        if field_attrs.skip {
            continue;
        }

        let wire_name = field_attrs
            .rename
            .unwrap_or_else(|| field_ident.unraw().to_string());
        if !used_names.insert(wire_name.clone()) {
            panic!(
                "Field name \"{}\" is duplicated for struct '{}'. Please specify a different name for field '{}' using #[igbinary(rename=...)].",
                wire_name, name, field_ident
            );
        }

        let ty = &f.ty;
        field_defs.push(quote! {
            igbinary::Field::new::<Self, #ty>(
                #wire_name,
                |r| ::core::option::Option::Some(&r.#field_ident),
                |r| ::core::option::Option::Some(&mut r.#field_ident),
            )
        });
    }

    quote! {
        impl #impl_generics igbinary::Value for #name #ty_generics #where_clause {
            fn shape() -> igbinary::Shape<Self> {
                igbinary::Shape::Record(<Self as igbinary::Record>::fields)
            }
        }

        impl #impl_generics igbinary::Record for #name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<igbinary::Field> {
                ::std::vec![#(#field_defs),*]
            }
        }
    }
    .into()
}
