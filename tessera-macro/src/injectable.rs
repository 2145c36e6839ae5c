use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Type,
};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_injectable_impl(&input, None) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

/// Lifecycle hooks a type opts into.
#[derive(Default)]
pub struct HookFlags {
    pub on_module_init: bool,
    pub on_module_destroy: bool,
    pub on_app_init: bool,
    pub on_app_destroy: bool,
}

impl HookFlags {
    /// Records `ident` if it names a hook; returns whether it did.
    pub fn set(&mut self, ident: &Ident) -> bool {
        let flag = match ident.to_string().as_str() {
            "on_module_init" => &mut self.on_module_init,
            "on_module_destroy" => &mut self.on_module_destroy,
            "on_app_init" => &mut self.on_app_init,
            "on_app_destroy" => &mut self.on_app_destroy,
            _ => return false,
        };
        *flag = true;
        true
    }

    fn to_lifecycle(&self) -> TokenStream2 {
        let mut calls = Vec::new();
        if self.on_module_init {
            calls.push(quote!(.on_module_init()));
        }
        if self.on_module_destroy {
            calls.push(quote!(.on_module_destroy()));
        }
        if self.on_app_init {
            calls.push(quote!(.on_app_init()));
        }
        if self.on_app_destroy {
            calls.push(quote!(.on_app_destroy()));
        }
        quote!(::tessera::Lifecycle::new() #(#calls)*)
    }
}

#[derive(Default)]
struct TypeArgs {
    scope: Option<LitStr>,
    hooks: HookFlags,
}

fn parse_type_args(attrs: &[Attribute]) -> syn::Result<TypeArgs> {
    let mut args = TypeArgs::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("injectable")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("scope") {
                args.scope = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if let Some(ident) = meta.path.get_ident() {
                if args.hooks.set(ident) {
                    return Ok(());
                }
            }
            Err(meta.error("expected `scope = \"...\"` or a lifecycle hook name"))
        })?;
    }
    Ok(args)
}

fn scope_tokens(scope: &LitStr) -> syn::Result<TokenStream2> {
    match scope.value().as_str() {
        "singleton" => Ok(quote!(::tessera::Scope::Singleton)),
        "transient" => Ok(quote!(::tessera::Scope::Transient)),
        "request" => Ok(quote!(::tessera::Scope::Request)),
        _ => Err(syn::Error::new_spanned(
            scope,
            "scope must be \"singleton\", \"transient\" or \"request\"",
        )),
    }
}

enum FieldKind {
    /// `Arc<T>` bound under `T`
    Class(Type),
    /// `Arc<T>` bound under an injection token
    Token(Expr),
    /// `Vec<Arc<T>>` multi-bound under an injection token
    All(Expr),
    /// `Lazy<T>`, optionally under an injection token
    Lazy(Type, Option<Expr>),
    Default,
}

#[derive(Default)]
struct FieldArgs {
    token: Option<Expr>,
    all: Option<Expr>,
    default: bool,
}

fn parse_field_args(attrs: &[Attribute]) -> syn::Result<FieldArgs> {
    let mut args = FieldArgs::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("token") {
                args.token = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("all") {
                args.all = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("default") {
                args.default = true;
            } else {
                return Err(meta.error("expected `token = ...`, `all = ...` or `default`"));
            }
            Ok(())
        })?;
    }
    Ok(args)
}

fn classify(field: &syn::Field) -> syn::Result<FieldKind> {
    let args = parse_field_args(&field.attrs)?;
    if args.default {
        return Ok(FieldKind::Default);
    }
    if let Some(all) = args.all {
        return Ok(FieldKind::All(all));
    }
    if let Some(inner) = generic_inner(&field.ty, "Lazy") {
        return Ok(FieldKind::Lazy(inner.clone(), args.token));
    }
    if let Some(token) = args.token {
        return Ok(FieldKind::Token(token));
    }
    match generic_inner(&field.ty, "Arc") {
        Some(inner) => Ok(FieldKind::Class(inner.clone())),
        None => Err(syn::Error::new_spanned(
            &field.ty,
            "injected fields must be `Arc<T>` or `Lazy<T>`; use #[inject(default)] for other fields",
        )),
    }
}

/// The single type argument of `wrapper<T>`, if `ty` is one.
fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn lazy_dependency(ty: &Type, token: Option<&Expr>) -> TokenStream2 {
    match token {
        Some(token) => quote! {
            ::tessera::Dependency::Forward(::tessera::forward_ref(|| (#token).token()))
        },
        None => quote! {
            ::tessera::Dependency::Forward(::tessera::forward_ref(|| ::tessera::Token::of::<#ty>()))
        },
    }
}

/// Generates `impl Injectable`; `module` carries the extra items of a
/// `#[module]` type.
pub fn generate_injectable_impl(
    input: &DeriveInput,
    module: Option<&HookFlags>,
) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let args = parse_type_args(&input.attrs)?;

    let data = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                input.to_token_stream(),
                "#[derive(Injectable)] can only be applied to structs",
            ))
        }
    };

    let mut constructors = Vec::new();
    let mut points = Vec::new();
    let construct = match &data.fields {
        Fields::Unit => quote!(Self),
        Fields::Unnamed(fields) => {
            return Err(syn::Error::new_spanned(
                fields,
                "#[derive(Injectable)] only supports structs with named fields",
            ))
        }
        Fields::Named(fields) => {
            for field in &fields.named {
                let Some(field_name) = &field.ident else {
                    continue;
                };
                let member = field_name.to_string();
                let (value, point) = match classify(field)? {
                    FieldKind::Class(ty) => (
                        quote!(resolver.get::<#ty>()?),
                        Some(quote!(::tessera::Token::of::<#ty>())),
                    ),
                    FieldKind::Token(token) => (
                        quote!(resolver.get_token(&(#token))?),
                        Some(quote!(&(#token))),
                    ),
                    FieldKind::All(token) => (
                        quote!(resolver.get_all(&(#token))?),
                        Some(quote!(&(#token))),
                    ),
                    FieldKind::Lazy(ty, token) => {
                        let dependency = lazy_dependency(&ty, token.as_ref());
                        (
                            quote!(resolver.lazy_dependency::<#ty>(#dependency)),
                            Some(dependency),
                        )
                    }
                    FieldKind::Default => (quote!(::std::default::Default::default()), None),
                };
                constructors.push(quote!(#field_name: #value));
                if let Some(point) = point {
                    points.push(quote!(::tessera::InjectionPoint::new(#member, #point)));
                }
            }
            quote!(Self { #(#constructors),* })
        }
    };

    let scope = match &args.scope {
        Some(scope) => {
            let scope = scope_tokens(scope)?;
            quote! {
                fn scope() -> ::tessera::Scope {
                    #scope
                }
            }
        }
        None => quote!(),
    };

    // hooks may be declared on the module attribute as well as on the type
    let mut hooks = args.hooks;
    if let Some(module_hooks) = module {
        hooks.on_module_init |= module_hooks.on_module_init;
        hooks.on_module_destroy |= module_hooks.on_module_destroy;
        hooks.on_app_init |= module_hooks.on_app_init;
        hooks.on_app_destroy |= module_hooks.on_app_destroy;
    }
    let lifecycle = hooks.to_lifecycle();

    let as_module = match module {
        Some(_) => quote! {
            fn as_module() -> ::std::option::Option<::tessera::ModuleType> {
                ::std::option::Option::Some(::tessera::ModuleType::of::<Self>())
            }
        },
        None => quote!(),
    };

    Ok(quote! {
        impl #impl_generics ::tessera::Injectable for #struct_name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn inject(
                resolver: &::tessera::Resolver<'_>
            ) -> ::tessera::Result<Self> {
                Ok(#construct)
            }

            #scope

            fn dependencies() -> ::std::vec::Vec<::tessera::InjectionPoint> {
                ::std::vec![#(#points),*]
            }

            fn lifecycle() -> ::tessera::Lifecycle<Self> {
                #lifecycle
            }

            #as_module
        }
    })
}
