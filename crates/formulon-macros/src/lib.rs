//! `#[excel_fn]`: expands a free function into a `Function` impl plus a
//! zero-sized marker struct, so built-ins read as plain Rust functions
//! instead of hand-written trait boilerplate. Expected to be invoked from
//! within `formulon-eval` itself (the generated impl targets
//! `crate::function::Function`), but any crate with the same module
//! layout can use it for its own user-defined functions.

use formulon_common::ArgKind;
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{AttributeArgs, ItemFn, Lit, Meta, NestedMeta, parse_macro_input};

#[proc_macro_attribute]
pub fn excel_fn(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttributeArgs);
    let func_item = parse_macro_input!(item as ItemFn);

    let mut attr_name = func_item.sig.ident.to_string().to_ascii_uppercase();
    let mut min_args = 0usize;
    let mut variadic = false;
    let mut volatile = false;
    let mut arg_kinds = Vec::<ArgKind>::new();

    for meta in args {
        match meta {
            NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("name") => {
                if let Lit::Str(s) = &nv.lit {
                    attr_name = s.value();
                }
            }
            NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("min") => {
                if let Lit::Int(i) = &nv.lit {
                    min_args = i.base10_parse::<usize>().unwrap();
                }
            }
            NestedMeta::Meta(Meta::Path(p)) if p.is_ident("variadic") => variadic = true,
            NestedMeta::Meta(Meta::Path(p)) if p.is_ident("volatile") => volatile = true,
            NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("arg_types") => {
                if let Lit::Str(list) = &nv.lit {
                    arg_kinds = list.value().split(',').map(|s| ArgKind::parse(s)).collect();
                }
            }
            _ => {}
        }
    }

    let arg_spec_tokens = arg_kinds.iter().map(|k| {
        let variant = match k {
            ArgKind::Number => quote! { Number },
            ArgKind::Text => quote! { Text },
            ArgKind::Logical => quote! { Logical },
            ArgKind::Range => quote! { Range },
            ArgKind::Any => quote! { Any },
        };
        quote! { formulon_common::ArgSpec::new(formulon_common::ArgKind::#variant) }
    });

    let vis = &func_item.vis;
    let user_fn_ident = &func_item.sig.ident;
    let wrapper_ident = format_ident!("__Fn{}", attr_name.to_uppercase().replace(['.', ' '], "_"));

    let expanded = quote! {
        #func_item

        #vis struct #wrapper_ident;

        impl crate::function::Function for #wrapper_ident {
            fn name(&self) -> &'static str { #attr_name }
            fn volatile(&self) -> bool { #volatile }
            fn min_args(&self) -> usize { #min_args }
            fn variadic(&self) -> bool { #variadic }
            fn arg_schema(&self) -> &'static [formulon_common::ArgSpec] {
                const SCHEMA: &[formulon_common::ArgSpec] = &[ #(#arg_spec_tokens),* ];
                SCHEMA
            }

            fn eval(
                &self,
                args: &[crate::function::ArgumentHandle<'_>],
                ctx: &mut dyn crate::context::EvalContext,
            ) -> crate::result::EvalResult {
                #user_fn_ident(args, ctx)
            }
        }
    };

    TokenStream::from(expanded)
}
