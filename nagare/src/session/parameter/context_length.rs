use crate::session::parameter::ResolvableValue;

/// Upper bound on prompt plus generated tokens for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextLength {
    Unbounded,
    Custom(usize),
}

impl Default for ContextLength {
    fn default() -> Self {
        ContextLength::Unbounded
    }
}

impl ResolvableValue<Option<usize>> for ContextLength {
    fn resolve(&self) -> Option<usize> {
        match self {
            ContextLength::Unbounded => None,
            ContextLength::Custom(value) => Some(*value),
        }
    }
}
