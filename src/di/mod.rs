mod injectable;
mod injector;
mod lazy;
mod provider;
mod token;

pub use injectable::{Injectable, InjectableType, Scope};
pub use injector::{Injector, Resolver};
pub use lazy::Lazy;
pub use provider::{Deps, Factory, Provider, ProviderKind};
pub use token::{
    forward_ref, Dependency, ForwardRef, InjectionPoint, InjectionToken, Instance, Token,
};

pub(crate) use injector::downcast;
pub(crate) use provider::factory_binding;
pub(crate) use token::short_type_name;
