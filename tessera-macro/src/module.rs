use crate::injectable::{generate_injectable_impl, HookFlags};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, punctuated::Punctuated, DeriveInput,
    Expr, Fields, Ident, ItemStruct, Token,
};

struct ModuleArgs {
    imports: Vec<Expr>,
    providers: Vec<Expr>,
    exports: Vec<Expr>,
    global: bool,
    scoped: bool,
    hooks: HookFlags,
}

impl Parse for ModuleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = ModuleArgs {
            imports: Vec::new(),
            providers: Vec::new(),
            exports: Vec::new(),
            global: false,
            scoped: false,
            hooks: HookFlags::default(),
        };

        while !input.is_empty() {
            let name: Ident = input.parse()?;

            if input.peek(Token![=]) {
                input.parse::<Token![=]>()?;

                // Parse array: [Item1, Item2, ...]
                let content;
                syn::bracketed!(content in input);
                let items: Vec<Expr> = Punctuated::<Expr, Token![,]>::parse_terminated(&content)?
                    .into_iter()
                    .collect();

                if name == "imports" {
                    args.imports = items;
                } else if name == "providers" {
                    args.providers = items;
                } else if name == "exports" {
                    args.exports = items;
                } else {
                    return Err(syn::Error::new_spanned(
                        name,
                        "expected `imports`, `providers` or `exports`",
                    ));
                }
            } else if name == "global" {
                args.global = true;
            } else if name == "scoped" {
                args.scoped = true;
            } else if !args.hooks.set(&name) {
                return Err(syn::Error::new_spanned(
                    name,
                    "expected `global`, `scoped` or a lifecycle hook name",
                ));
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

pub fn module_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ModuleArgs);
    let input = parse_macro_input!(item as ItemStruct);

    match generate_module_impl(&args, input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

/// A bare path is a type, anything else a value converted with `From`.
fn entry(item: &Expr, of_type: TokenStream2, from: TokenStream2) -> TokenStream2 {
    match item {
        Expr::Path(path) if path.qself.is_none() => {
            let path = &path.path;
            quote!(#of_type::<#path>())
        }
        expr => quote!(#from(#expr)),
    }
}

fn generate_module_impl(args: &ModuleArgs, mut input: ItemStruct) -> syn::Result<TokenStream2> {
    let derive: DeriveInput = syn::parse2(input.to_token_stream())?;
    let injectable = generate_injectable_impl(&derive, Some(&args.hooks))?;

    // helper attributes are consumed here, the emitted struct must not carry them
    input
        .attrs
        .retain(|attr| !attr.path().is_ident("injectable"));
    if let Fields::Named(fields) = &mut input.fields {
        for field in fields.named.iter_mut() {
            field.attrs.retain(|attr| !attr.path().is_ident("inject"));
        }
    }

    let module_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let imports = args.imports.iter().map(|item| {
        entry(
            item,
            quote!(::tessera::ModuleImport::of),
            quote!(::tessera::ModuleImport::from),
        )
    });
    let providers = args.providers.iter().map(|item| {
        entry(
            item,
            quote!(::tessera::Provider::of),
            quote!(::tessera::Provider::from),
        )
    });
    let exports = args.exports.iter().map(|item| {
        entry(
            item,
            quote!(::tessera::ExportRef::of),
            quote!(::tessera::ExportRef::from),
        )
    });
    let global = args.global;
    let scoped = args.scoped;

    Ok(quote! {
        #input

        #injectable

        impl #impl_generics ::tessera::Module for #module_name #ty_generics #where_clause {
            fn metadata() -> ::tessera::ModuleMetadata {
                ::tessera::ModuleMetadata {
                    imports: ::std::vec![#(#imports),*],
                    providers: ::std::vec![#(#providers),*],
                    exports: ::std::vec![#(#exports),*],
                }
            }

            fn is_global() -> bool {
                #global
            }

            fn is_scoped() -> bool {
                #scoped
            }
        }

        impl #impl_generics #module_name #ty_generics #where_clause {
            /// Import reference to this module
            pub fn import() -> ::tessera::ModuleImport {
                ::tessera::ModuleImport::of::<Self>()
            }
        }
    })
}
