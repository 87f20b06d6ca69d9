/// Conditions a caller may want to tell apart from other failures.
///
/// These travel inside `anyhow::Error`; use
/// `err.downcast_ref::<HierarchyError>()` to recover them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// Level sizes, assignments, or operators do not fit together
    Inconsistent { what: String },
    /// Another mutating call is still running
    Locked,
}

impl HierarchyError {
    pub fn inconsistent(what: impl Into<String>) -> Self {
        HierarchyError::Inconsistent { what: what.into() }
    }
}

impl std::fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HierarchyError::Inconsistent { what } => write!(f, "inconsistent hierarchy: {}", what),
            HierarchyError::Locked => write!(f, "another interaction is in progress"),
        }
    }
}

impl std::error::Error for HierarchyError {}

/// `Err(HierarchyError::Inconsistent)` unless `cond` holds
macro_rules! ensure_consistent {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HierarchyError::inconsistent(format!($($arg)+)).into());
        }
    };
}

pub(crate) use ensure_consistent;
