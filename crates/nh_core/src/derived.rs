/// A value produced by a best-effort step, or the default it fell back to.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived<T> {
    Generated(T),
    Fallback { value: T, reason: String },
}

impl<T> Derived<T> {
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Derived::Fallback { value, reason: reason.into() }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Derived::Fallback { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Derived::Generated(value) | Derived::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Derived::Generated(value) | Derived::Fallback { value, .. } => value,
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Derived::Generated(_) => None,
            Derived::Fallback { reason, .. } => Some(reason),
        }
    }
}
