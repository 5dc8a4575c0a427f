#![forbid(unsafe_code)]

//! Derive macro for [`cycle_rc::Trace`](../cycle_rc/trait.Trace.html).
//!
//! Generates a `trace` implementation which visits every field, recursing into each field's own
//! `Trace` impl until a [`Gc`](../cycle_rc/struct.Gc.html) field is reached and reported to the
//! collector. Fields can be excluded with `#[cycle_rc(ignore)]` when they are known to never hold
//! a child.

use proc_macro_error::{abort_if_dirty, emit_error, proc_macro_error};
use quote::quote;
use syn::{Attribute, Data, Meta, MetaList, Token};
use syn::punctuated::Punctuated;
use synstructure::{decl_derive, AddBounds, Structure};

const IGNORE: &str = "ignore";

decl_derive!([Trace, attributes(cycle_rc)] => #[proc_macro_error] derive_trace_trait);

fn derive_trace_trait(mut s: Structure<'_>) -> proc_macro2::TokenStream {
    // Surface malformed container-level attributes even though none are currently recognized here.
    for attr in &s.ast().attrs {
        attr_contains(attr, IGNORE);
    }

    // Exclude every field and variant annotated with #[cycle_rc(ignore)].
    // Fields are filtered before variants so that errors in ignored variants are still reported.
    s.filter(|bi| {
        !bi.ast().attrs
            .iter()
            .any(|attr| attr_contains(attr, IGNORE))
    });

    if let Data::Enum(_) = s.ast().data {
        s.filter_variants(|vi| {
            !vi.ast().attrs
                .iter()
                .any(|attr| attr_contains(attr, IGNORE))
        });
    }

    abort_if_dirty();

    // Identifier for the ctx parameter of Trace::trace(...). Shouldn't clash with user identifiers.
    let ctx = quote::format_ident!("__cycle_rc__Trace__ctx__");

    let body = s.each(|bi| {
        let ty = &bi.ast().ty;
        quote! {
            <#ty as cycle_rc::Trace>::trace(#bi, #ctx);
        }
    });

    s.underscore_const(true);
    s.add_bounds(AddBounds::Fields);

    s.gen_impl(quote! {
        extern crate cycle_rc;

        gen unsafe impl cycle_rc::Trace for @Self {
            #[inline]
            #[allow(non_snake_case)]
            fn trace(&self, #ctx: &mut cycle_rc::Context<'_>) {
                match *self { #body }
            }
        }
    })
}

fn get_meta_items(attr: &Attribute) -> Option<&MetaList> {
    if attr.path().is_ident("cycle_rc") {
        match &attr.meta {
            Meta::List(meta) => Some(meta),
            err => {
                emit_error!(err, "Invalid attribute");
                None
            },
        }
    } else {
        None
    }
}

fn attr_contains(attr: &Attribute, ident: &str) -> bool {
    let Some(meta_list) = get_meta_items(attr) else {
        return false;
    };

    let nested = match meta_list.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated) {
        Ok(nested) => nested,
        Err(err) => {
            emit_error!(meta_list, "Invalid attribute: {}", err);
            return false;
        },
    };

    for meta in nested {
        match meta {
            Meta::Path(path) if path.is_ident(ident) => {
                return true;
            },
            Meta::Path(path) => {
                emit_error!(path, "Unrecognized attribute");
            },
            err => {
                emit_error!(err, "Invalid attribute");
            },
        }
    }

    false
}
