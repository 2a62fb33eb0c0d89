use convert_case::{Case, Casing};
use darling::util::Flag;
use darling::{FromDeriveInput, FromVariant};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Data, DataEnum, DeriveInput, Fields, GenericArgument, PathArguments, Type,
    Variant,
};

#[proc_macro_derive(Domain, attributes(domain))]
pub fn derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match expand(&input) {
        Ok(expanded) => expanded,
        Err(err) => err.write_errors(),
    };

    proc_macro::TokenStream::from(expanded)
}

#[derive(FromDeriveInput)]
#[darling(attributes(domain))]
struct DomainOpts {
    ident: Ident,
    table: Option<String>,
    /// The primary name, followed by shorthands.
    #[darling(multiple, rename = "name")]
    names: Vec<String>,
    primary_key: Option<String>,
}

#[derive(FromVariant, Default)]
#[darling(default, attributes(domain))]
struct VariantOpts {
    /// Searched by domain and value list searches.
    default: Flag,
    rename: Option<String>,
    /// Target table of a relationship.
    to: Option<String>,
    /// Local foreign key column of a many-to-one relationship.
    via: Option<String>,
    /// Remote foreign key column of a one-to-many relationship.
    remote: Option<String>,
    /// `relationship.attribute` of a proxy.
    proxy: Option<String>,
    /// Allowed values of an enumerated attribute.
    #[darling(multiple)]
    choice: Vec<String>,
}

struct Info {
    builders: Vec<TokenStream>,
    defaults: Vec<String>,
}

fn expand(input: &DeriveInput) -> darling::Result<TokenStream> {
    let opts = DomainOpts::from_derive_input(input)?;

    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return Err(error(&input.ident, "Derive can only be used on enum types"))
        }
    };

    let ident = &opts.ident;
    let table = opts
        .table
        .clone()
        .unwrap_or_else(|| ident.to_string().to_case(Case::Snake));
    let primary_key = opts.primary_key.clone().unwrap_or_else(|| "id".to_string());
    let names = match opts.names.is_empty() {
        true => vec![table.clone()],
        false => opts.names.clone(),
    };

    let Info { builders, defaults } = collect(data)?;

    Ok(quote! {
        impl ::taxa_search::schema::Entity for #ident {
            fn table() -> ::taxa_search::schema::Table {
                ::taxa_search::schema::Table::new(#table)
                    .primary_key(#primary_key)
                    #(#builders)*
            }

            fn names() -> &'static [&'static str] {
                &[ #(#names, )* ]
            }

            fn default_attributes() -> &'static [&'static str] {
                &[ #(#defaults, )* ]
            }
        }
    })
}

fn collect(data: &DataEnum) -> darling::Result<Info> {
    let mut builders = vec![];
    let mut defaults = vec![];

    for variant in &data.variants {
        let opts = VariantOpts::from_variant(variant)?;
        let name = opts
            .rename
            .clone()
            .unwrap_or_else(|| variant.ident.to_string().to_case(Case::Snake));

        match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let kind = match opts.choice.is_empty() {
                    true => attribute_type(&fields.unnamed[0].ty)?,
                    false => {
                        let choices = &opts.choice;
                        quote! {
                            ::taxa_search::schema::AttributeType::Enumerated(
                                vec![ #(#choices.to_string(), )* ]
                            )
                        }
                    }
                };
                if opts.default.is_present() {
                    defaults.push(name.clone());
                }
                builders.push(quote! { .attribute(#name, #kind) });
            }
            Fields::Unit => {
                if opts.default.is_present() {
                    return Err(error(variant, "Only attributes can be searched by default"));
                }
                builders.push(relation(variant, &name, &opts)?);
            }
            _ => {
                return Err(error(variant, "Variant must have zero or one unnamed field exactly"))
            }
        }
    }

    Ok(Info { builders, defaults })
}

fn relation(variant: &Variant, name: &str, opts: &VariantOpts) -> darling::Result<TokenStream> {
    if let Some(proxy) = &opts.proxy {
        let Some((relationship, attribute)) = proxy.split_once('.') else {
            return Err(error(variant, "A proxy must be given as 'relationship.attribute'"));
        };
        return Ok(quote! { .proxy(#name, #relationship, #attribute) });
    }

    let Some(to) = &opts.to else {
        return Err(error(variant, "A relationship needs a target table: #[domain(to = \"table\")]"));
    };

    match (&opts.via, &opts.remote) {
        (Some(via), None) => Ok(quote! { .belongs_to(#name, #to, #via) }),
        (None, Some(remote)) => Ok(quote! { .has_many(#name, #to, #remote) }),
        _ => Err(error(variant, "A relationship needs exactly one of 'via' or 'remote'")),
    }
}

/// Map a Rust field type to the attribute type, by the name of the type.
fn attribute_type(ty: &Type) -> darling::Result<TokenStream> {
    let Type::Path(path) = ty else {
        return Err(error(ty, "Unsupported attribute type"));
    };
    let Some(segment) = path.path.segments.last() else {
        return Err(error(ty, "Unsupported attribute type"));
    };

    let kind = match segment.ident.to_string().as_str() {
        "Option" => {
            return match &segment.arguments {
                PathArguments::AngleBracketed(args) => match args.args.first() {
                    Some(GenericArgument::Type(inner)) => attribute_type(inner),
                    _ => Err(error(ty, "Unsupported attribute type")),
                },
                _ => Err(error(ty, "Unsupported attribute type")),
            }
        }
        "String" | "str" | "char" => quote! { Text },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { Integer }
        }
        "f32" | "f64" => quote! { Float },
        "bool" => quote! { Boolean },
        "Date" | "NaiveDate" => quote! { Date },
        "PrimitiveDateTime" | "NaiveDateTime" => quote! { DateTime },
        "OffsetDateTime" | "DateTime" => quote! { Timestamp },
        _ => return Err(error(ty, "Unsupported attribute type")),
    };

    Ok(quote! { ::taxa_search::schema::AttributeType::#kind })
}

fn error(node: &impl Spanned, message: &str) -> darling::Error {
    darling::Error::custom(message).with_span(node)
}
