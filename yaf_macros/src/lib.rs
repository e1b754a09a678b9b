//! Attribute macros for yaf controllers and bootstraps.
//!
//! - `#[actions]` on an impl block turns every `*_action` method into an
//!   entry of a generated `action_table()`, binding the extra parameters
//!   from the request params by name.
//! - `#[bootstrap]` on an impl block implements `yaf::bootstrap::Bootstrap`,
//!   listing the dispatcher-taking methods in declaration order.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Attribute, FnArg, ImplItem, ImplItemFn, ItemImpl, Lit, Pat, Signature, Type,
};

const ACTION_SUFFIX: &str = "_action";
const INIT_PREFIX: &str = "_init";

/// Generate `fn action_table() -> ActionTable<Self>` from the `*_action`
/// methods of the impl block.
///
/// ```rust,ignore
/// #[yaf::actions]
/// impl UserController {
///     fn list_action(
///         &mut self,
///         cx: &mut ActionContext<'_>,
///         #[param(default = 1)] page: u32,
///         sort: Option<String>,
///     ) -> yaf::Result<()> {
///         ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn actions(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = TokenStream2::from(attr);
    if !attr.is_empty() {
        return syn::Error::new_spanned(attr, "#[actions] takes no arguments")
            .to_compile_error()
            .into();
    }
    let mut input = parse_macro_input!(item as ItemImpl);
    match expand_actions(&mut input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_actions(input: &mut ItemImpl) -> syn::Result<TokenStream2> {
    let mut entries = Vec::new();
    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        let name = method.sig.ident.to_string();
        let Some(action) = name.strip_suffix(ACTION_SUFFIX) else {
            continue;
        };
        if action.is_empty() {
            return Err(syn::Error::new_spanned(
                &method.sig.ident,
                "action method needs a name before `_action`",
            ));
        }
        let action = action.to_lowercase();
        entries.push(action_entry(method, &action)?);
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        #input

        impl #impl_generics #self_ty #where_clause {
            /// Action table built from the `*_action` methods.
            pub fn action_table() -> ::yaf::controller::ActionTable<Self> {
                ::yaf::controller::ActionTable::new()
                    #(#entries)*
            }
        }
    })
}

fn action_entry(method: &mut ImplItemFn, action: &str) -> syn::Result<TokenStream2> {
    let ident = method.sig.ident.clone();
    if !takes_mut_self(&method.sig) {
        return Err(syn::Error::new_spanned(
            &method.sig,
            "action methods take `&mut self` first",
        ));
    }
    if method.sig.inputs.len() < 2 {
        return Err(syn::Error::new_spanned(
            &method.sig,
            "action methods take the action context after `&mut self`",
        ));
    }

    let mut specs = Vec::new();
    let mut binds = Vec::new();
    let mut passes_args = false;
    for arg in method.sig.inputs.iter_mut().skip(2) {
        let FnArg::Typed(pat_type) = arg else {
            return Err(syn::Error::new_spanned(arg, "unexpected receiver"));
        };
        let default = take_default(&mut pat_type.attrs)?;
        if is_args_ref(&pat_type.ty) {
            if default.is_some() {
                return Err(syn::Error::new_spanned(&pat_type.ty, "`&Args` takes no default"));
            }
            passes_args = true;
            binds.push(quote!(args));
            continue;
        }
        let name = match &*pat_type.pat {
            Pat::Ident(p) => p.ident.to_string().trim_start_matches('_').to_string(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "action parameters must be plain identifiers",
                ))
            }
        };
        let ty = &pat_type.ty;
        let position = specs.len();
        specs.push(match default {
            Some(value) => quote!(::yaf::controller::ParamSpec::with_default(#name, #value)),
            None => quote!(::yaf::controller::ParamSpec::new(#name)),
        });
        binds.push(quote!(args.get::<#ty>(#position)?));
    }

    let args = if specs.is_empty() && !passes_args {
        format_ident!("_args")
    } else {
        format_ident!("args")
    };
    Ok(quote! {
        .action(
            #action,
            &[#(#specs),*],
            |this: &mut Self,
             cx: &mut ::yaf::controller::ActionContext<'_>,
             #args: &::yaf::controller::Args|
             -> ::yaf::Result<()> { this.#ident(cx, #(#binds),*) },
        )
    })
}

/// Remove `#[param(default = ...)]` and return the default as text.
fn take_default(attrs: &mut Vec<Attribute>) -> syn::Result<Option<String>> {
    let mut default = None;
    let mut error = None;
    attrs.retain(|attr| {
        if !attr.path().is_ident("param") {
            return true;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident("default") {
                return Err(meta.error("expected `default = <literal>`"));
            }
            let text = match meta.value()?.parse::<Lit>()? {
                Lit::Str(s) => s.value(),
                Lit::Int(i) => i.base10_digits().to_string(),
                Lit::Float(f) => f.base10_digits().to_string(),
                Lit::Bool(b) => b.value.to_string(),
                other => return Err(syn::Error::new_spanned(other, "unsupported default literal")),
            };
            default = Some(text);
            Ok(())
        });
        if let Err(e) = parsed {
            error = Some(e);
        }
        false
    });
    match error {
        Some(e) => Err(e),
        None => Ok(default),
    }
}

fn takes_mut_self(sig: &Signature) -> bool {
    matches!(
        sig.inputs.first(),
        Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_some()
    )
}

/// `&Args` (any path ending in `Args`).
fn is_args_ref(ty: &Type) -> bool {
    let Type::Reference(reference) = ty else {
        return false;
    };
    if reference.mutability.is_some() {
        return false;
    }
    match &*reference.elem {
        Type::Path(p) => p.path.segments.last().is_some_and(|s| s.ident == "Args"),
        _ => false,
    }
}

/// Implement `yaf::bootstrap::Bootstrap` for the impl block's type.
///
/// Every method shaped `fn(&mut self, &mut Dispatcher) -> yaf::Result<()>`
/// is listed in declaration order; the runner only calls those whose name
/// starts with `_init`. An `_init*` method of another shape is an error.
#[proc_macro_attribute]
pub fn bootstrap(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = TokenStream2::from(attr);
    if !attr.is_empty() {
        return syn::Error::new_spanned(attr, "#[bootstrap] takes no arguments")
            .to_compile_error()
            .into();
    }
    let input = parse_macro_input!(item as ItemImpl);
    match expand_bootstrap(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_bootstrap(input: &ItemImpl) -> syn::Result<TokenStream2> {
    let mut entries = Vec::new();
    for item in &input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        let ident = &method.sig.ident;
        let name = ident.to_string();
        if takes_dispatcher(&method.sig) {
            entries.push(quote! {
                (#name, Self::#ident as ::yaf::bootstrap::InitMethod<Self>)
            });
        } else if is_init_name(&name) {
            return Err(syn::Error::new_spanned(
                &method.sig,
                "init methods take `&mut self` and `&mut Dispatcher` and return `yaf::Result<()>`",
            ));
        }
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        #input

        impl #impl_generics ::yaf::bootstrap::Bootstrap for #self_ty #where_clause {
            fn methods() -> ::std::vec::Vec<(&'static str, ::yaf::bootstrap::InitMethod<Self>)> {
                ::std::vec![#(#entries),*]
            }
        }
    })
}

fn takes_dispatcher(sig: &Signature) -> bool {
    takes_mut_self(sig)
        && sig.inputs.len() == 2
        && matches!(
            sig.inputs.iter().nth(1),
            Some(FnArg::Typed(arg)) if matches!(&*arg.ty, Type::Reference(r) if r.mutability.is_some())
        )
}

fn is_init_name(name: &str) -> bool {
    name.len() >= INIT_PREFIX.len()
        && name.is_char_boundary(INIT_PREFIX.len())
        && name[..INIT_PREFIX.len()].eq_ignore_ascii_case(INIT_PREFIX)
}
