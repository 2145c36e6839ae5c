use crate::di::InjectableType;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// A type-erased provider value as stored by an injector.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Identity under which a provider is bound and looked up.
#[derive(Clone, Copy)]
pub enum Token {
    /// An injectable type, identified by its `TypeId`.
    Class(InjectableType),
    /// An explicit [`InjectionToken`], identified by its description.
    Injection(&'static str),
}

impl Token {
    pub fn of<T: crate::di::Injectable>() -> Self {
        Token::Class(InjectableType::of::<T>())
    }

    pub fn is_injection_token(&self) -> bool {
        matches!(self, Token::Injection(_))
    }

    pub fn as_class(&self) -> Option<&InjectableType> {
        match self {
            Token::Class(ty) => Some(ty),
            Token::Injection(_) => None,
        }
    }

    /// Human readable name used in error messages and logs.
    pub fn name(&self) -> String {
        match self {
            Token::Class(ty) => ty.name().to_string(),
            Token::Injection(desc) => format!("InjectionToken<{desc}>"),
        }
    }

    /// Stable, fully qualified identity string.
    pub(crate) fn fingerprint(&self) -> String {
        match self {
            Token::Class(ty) => ty.path().to_string(),
            Token::Injection(desc) => format!("InjectionToken<{desc}>"),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Class(a), Token::Class(b)) => a == b,
            (Token::Injection(a), Token::Injection(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Token::Class(ty) => {
                0u8.hash(state);
                ty.hash(state);
            }
            Token::Injection(desc) => {
                1u8.hash(state);
                desc.hash(state);
            }
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.name())
    }
}

/// A typed, non-class identity for values that have no unique type of their
/// own (configuration, trait objects) or that must be multi-bound.
///
/// Two tokens with the same description are the same token.
///
/// # Example
/// ```
/// use tessera::InjectionToken;
///
/// pub const DATABASE_URL: InjectionToken<String> = InjectionToken::new("DATABASE_URL");
/// ```
pub struct InjectionToken<T: ?Sized> {
    description: &'static str,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> InjectionToken<T> {
    pub const fn new(description: &'static str) -> Self {
        Self {
            description,
            _marker: PhantomData,
        }
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn token(&self) -> Token {
        Token::Injection(self.description)
    }
}

impl<T: ?Sized> Clone for InjectionToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for InjectionToken<T> {}

impl<T: ?Sized> fmt::Debug for InjectionToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectionToken<{}>", self.description)
    }
}

impl<T: ?Sized> From<&InjectionToken<T>> for Token {
    fn from(token: &InjectionToken<T>) -> Self {
        token.token()
    }
}

impl<T: ?Sized> From<InjectionToken<T>> for Token {
    fn from(token: InjectionToken<T>) -> Self {
        token.token()
    }
}

impl From<InjectableType> for Token {
    fn from(ty: InjectableType) -> Self {
        Token::Class(ty)
    }
}

/// A deferred reference, evaluated every time it is consumed.
///
/// Used to refer to providers or modules whose resolution has to wait until
/// the whole graph is declared.
pub struct ForwardRef<T> {
    resolve: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> ForwardRef<T> {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            resolve: Arc::new(resolve),
        }
    }

    pub fn resolve(&self) -> T {
        (self.resolve)()
    }

    /// Address of the thunk, used as reference identity.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.resolve) as *const () as usize
    }
}

impl<T> Clone for ForwardRef<T> {
    fn clone(&self) -> Self {
        Self {
            resolve: Arc::clone(&self.resolve),
        }
    }
}

impl<T> fmt::Debug for ForwardRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ForwardRef")
    }
}

/// Wraps `resolve` into a [`ForwardRef`].
///
/// ```
/// use tessera::{forward_ref, Token};
/// # #[derive(tessera::DeriveInjectable)] struct Later;
/// let later = forward_ref(|| Token::of::<Later>());
/// ```
pub fn forward_ref<T, F>(resolve: F) -> ForwardRef<T>
where
    F: Fn() -> T + Send + Sync + 'static,
{
    ForwardRef::new(resolve)
}

/// A dependency reference: either a token or a forward reference to one.
#[derive(Clone, Debug)]
pub enum Dependency {
    Token(Token),
    Forward(ForwardRef<Token>),
}

impl Dependency {
    /// Resolves forward references; plain tokens are returned as is.
    pub fn resolve(&self) -> Token {
        match self {
            Dependency::Token(token) => *token,
            Dependency::Forward(forward) => forward.resolve(),
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Dependency::Forward(_))
    }
}

impl From<Token> for Dependency {
    fn from(token: Token) -> Self {
        Dependency::Token(token)
    }
}

impl<T: ?Sized> From<&InjectionToken<T>> for Dependency {
    fn from(token: &InjectionToken<T>) -> Self {
        Dependency::Token(token.token())
    }
}

impl From<ForwardRef<Token>> for Dependency {
    fn from(forward: ForwardRef<Token>) -> Self {
        Dependency::Forward(forward)
    }
}

/// A dependency declared by an injectable on one of its members.
#[derive(Clone, Debug)]
pub struct InjectionPoint {
    pub member: &'static str,
    pub dependency: Dependency,
}

impl InjectionPoint {
    pub fn new(member: &'static str, dependency: impl Into<Dependency>) -> Self {
        Self {
            member,
            dependency: dependency.into(),
        }
    }
}

/// Strips the module path from a type name, keeping generic arguments.
pub(crate) fn short_type_name(path: &'static str) -> &'static str {
    let base = path.split('<').next().unwrap_or(path);
    let start = base.rfind("::").map_or(0, |i| i + 2);
    &path[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST: InjectionToken<u32> = InjectionToken::new("TEST");

    #[test]
    fn test_injection_tokens_compare_by_description() {
        let other: InjectionToken<u32> = InjectionToken::new("TEST");
        assert_eq!(TEST.token(), other.token());
        assert_ne!(TEST.token(), InjectionToken::<u32>::new("OTHER").token());
        assert_eq!(TEST.token().name(), "InjectionToken<TEST>");
    }

    #[test]
    fn test_forward_ref_is_evaluated_on_every_resolve() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let dependency = Dependency::from(forward_ref(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            TEST.token()
        }));

        assert!(dependency.is_forward());
        assert_eq!(dependency.resolve(), TEST.token());
        assert_eq!(dependency.resolve(), TEST.token());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("app::users::UserService"), "UserService");
        assert_eq!(
            short_type_name("app::Wrapper<alloc::string::String>"),
            "Wrapper<alloc::string::String>"
        );
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
