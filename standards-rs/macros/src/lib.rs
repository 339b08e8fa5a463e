//! Derive macros for standards-rs: `#[derive(Command)]`, `#[derive(Query)]`, `#[derive(DomainEvent)]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Type};

/// Type given by `#[response(Type)]`, if present.
fn response_type(input: &DeriveInput) -> syn::Result<Option<Type>> {
    let mut found = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("response") {
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(attr, "duplicate #[response(..)] attribute"));
        }
        found = Some(attr.parse_args::<Type>()?);
    }
    Ok(found)
}

fn request_impl(input: &DeriveInput, trait_name: &str, response: Type) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let trait_ident = syn::Ident::new(trait_name, proc_macro2::Span::call_site());
    quote! {
        impl #impl_generics ::standards_rs::#trait_ident for #name #ty_generics #where_clause {
            type Response = #response;
        }
    }
}

/// Implements `Command`. Response defaults to `()`; override with `#[response(Type)]`.
#[proc_macro_derive(Command, attributes(response))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match response_type(&input) {
        Ok(response) => {
            let response = response.unwrap_or_else(|| syn::parse_quote!(()));
            request_impl(&input, "Command", response).into()
        }
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `Query`. Requires `#[response(Type)]`: a query always returns data.
#[proc_macro_derive(Query, attributes(response))]
pub fn derive_query(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match response_type(&input) {
        Ok(Some(response)) => request_impl(&input, "Query", response).into(),
        Ok(None) => syn::Error::new_spanned(&input.ident, "#[derive(Query)] requires #[response(Type)]")
            .to_compile_error()
            .into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `DomainEvent` from a field named `occurred_at` of type `DateTime<Utc>`.
#[proc_macro_derive(DomainEvent)]
pub fn derive_domain_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let has_field = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields
                .named
                .iter()
                .any(|f| f.ident.as_ref().is_some_and(|i| i == "occurred_at")),
            _ => false,
        },
        _ => false,
    };
    if !has_field {
        return syn::Error::new_spanned(
            &input.ident,
            "#[derive(DomainEvent)] needs a named field `occurred_at: DateTime<Utc>`",
        )
        .to_compile_error()
        .into();
    }
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let expanded = quote! {
        impl #impl_generics ::standards_rs::DomainEvent for #name #ty_generics #where_clause {
            fn occurred_at(&self) -> ::standards_rs::chrono::DateTime<::standards_rs::chrono::Utc> {
                self.occurred_at
            }
        }
    };
    TokenStream::from(expanded)
}
