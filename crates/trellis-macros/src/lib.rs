use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, FnArg, Ident, ItemFn, LitStr, PatType, ReturnType};

/// Turns a render function into a `trellis_core::Component` constant.
///
/// ```ignore
/// #[component]
/// fn Greeting(props: &Props) -> RenderResult {
///     Ok(h!("p", (), format!("hello {}", props.str("name").unwrap_or("you"))).into())
/// }
///
/// root.render(h!(Greeting, props! { "name" => "Ada" }))?;
/// ```
///
/// The function may take no parameters, the props, or the props and the
/// children. `#[component("Name")]` overrides the display name used in logs
/// and inspection snapshots.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_tokens = TokenStream2::from(attr);
    let display_name = if attr_tokens.is_empty() {
        None
    } else {
        match syn::parse2::<LitStr>(attr_tokens) {
            Ok(name) => Some(name.value()),
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let func = parse_macro_input!(item as ItemFn);
    match expand(func, display_name) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(func: ItemFn, display_name: Option<String>) -> syn::Result<TokenStream2> {
    let sig = &func.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "components render synchronously; return Render::Pending instead of awaiting",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "components cannot be generic",
        ));
    }
    if let ReturnType::Default = sig.output {
        return Err(syn::Error::new_spanned(
            sig,
            "components must return trellis_core::RenderResult",
        ));
    }
    if sig.inputs.len() > 2 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "components take at most two parameters: props and children",
        ));
    }

    let mut params = Vec::new();
    for arg in &sig.inputs {
        match arg {
            FnArg::Typed(PatType { pat, ty, .. }) => params.push((pat.clone(), ty.clone())),
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "components cannot take self",
                ));
            }
        }
    }

    let props_param = match params.first() {
        Some((pat, ty)) => quote! { #pat: #ty },
        None => quote! { _: &::trellis_core::Props },
    };
    let children_param = match params.get(1) {
        Some((pat, ty)) => quote! { #pat: #ty },
        None => quote! { _: &[::trellis_core::VNode] },
    };

    let ident = &sig.ident;
    let name = display_name.unwrap_or_else(|| ident.to_string());
    let vis = &func.vis;
    let output = &sig.output;
    let block = &func.block;
    let (docs, attrs): (Vec<_>, Vec<_>) = func
        .attrs
        .iter()
        .partition(|attr| attr.path().is_ident("doc"));
    let render_ident = Ident::new(&format!("__render_{ident}"), Span::call_site());

    Ok(quote! {
        #(#docs)*
        #[allow(non_upper_case_globals)]
        #vis const #ident: ::trellis_core::Component = {
            #(#attrs)*
            #[allow(non_snake_case)]
            fn #render_ident(#props_param, #children_param) #output #block
            ::trellis_core::Component::new(#name, #render_ident)
        };
    })
}
