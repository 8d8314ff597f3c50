//! Shared parsing for the derive inputs.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, FieldsNamed};

/// Options read from `#[<name>(Context = "...", krate = "...")]`.
pub struct Options {
    /// Context type the fields are resolved from.
    pub context: Option<syn::Type>,
    /// Path of the crate that defines `FromRef`.
    pub krate: TokenStream,
}

impl Options {
    pub fn parse(input: &DeriveInput, name: &str) -> syn::Result<Self> {
        let mut context = None;
        let mut krate = None;

        for attr in input.attrs.iter().filter(|a| a.path().is_ident(name)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("Context") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    context = Some(value.parse()?);
                    Ok(())
                } else if meta.path.is_ident("krate") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    krate = Some(value.parse::<syn::Path>()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `Context` or `krate`"))
                }
            })?;
        }

        Ok(Self {
            context,
            krate: krate.map_or_else(|| quote! { crate }, |path| quote! { #path }),
        })
    }

    /// Path to the `FromRef` trait.
    pub fn from_ref(&self) -> TokenStream {
        let krate = &self.krate;
        quote! { #krate::FromRef }
    }
}

/// Named fields of a struct, or a spanned error naming the derive.
pub fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> syn::Result<&'a FieldsNamed> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(fields),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{} can only be derived for structs with named fields", derive),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{} can only be derived for structs", derive),
        )),
    }
}
