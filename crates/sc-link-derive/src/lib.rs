//! `#[derive(GuardedCodec)]`: opt a type out of generic serialization.
//!
//! The derive implements `sc_link::guard::SelfManagedCodec` together with
//! `serde::Serialize` and `serde::Deserialize` impls that refuse to run. Any
//! container that reaches the type through serde (a field, a newtype, a
//! `Box`, a `Vec`, a map value) fails with the same guard violation, so the
//! only way to get bytes in or out is the explicit encoder and decoder in
//! `sc_link`.
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, spanned::Spanned, Data, DeriveInput};

/// Marks a struct or enum as self-managed. See the crate docs.
#[proc_macro_derive(GuardedCodec)]
pub fn derive_guarded_codec(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    if let Data::Union(data) = &input.data {
        return syn::Error::new(
            data.union_token.span(),
            "GuardedCodec cannot be derived for unions",
        )
        .to_compile_error()
        .into();
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut de_generics = input.generics.clone();
    de_generics.params.insert(0, parse_quote!('de));
    let (de_impl_generics, _, _) = de_generics.split_for_impl();

    TokenStream::from(quote! {
        impl #impl_generics ::sc_link::guard::SelfManagedCodec for #name #ty_generics #where_clause {}

        impl #impl_generics ::sc_link::__private::serde::Serialize for #name #ty_generics #where_clause {
            fn serialize<__S>(&self, _serializer: __S) -> ::core::result::Result<__S::Ok, __S::Error>
            where
                __S: ::sc_link::__private::serde::Serializer,
            {
                ::sc_link::guard::reject_encode::<__S::Error, __S::Ok>(::core::stringify!(#name))
            }
        }

        impl #de_impl_generics ::sc_link::__private::serde::Deserialize<'de> for #name #ty_generics #where_clause {
            fn deserialize<__D>(_deserializer: __D) -> ::core::result::Result<Self, __D::Error>
            where
                __D: ::sc_link::__private::serde::Deserializer<'de>,
            {
                ::sc_link::guard::reject_decode::<__D::Error, Self>(::core::stringify!(#name))
            }
        }
    })
}
