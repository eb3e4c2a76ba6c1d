use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Structural,
    InvalidParameter,
    Numerical,
    Optimizer,
    Multiple,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

/// The engine's error type. Every public mutation path returns `EngineResult`;
/// a kernel that raises during recomputation leaves the engine poisoned (cached
/// likelihood/gradient tables may reflect a partially updated model).
#[derive(Debug)]
pub enum EngineError {
    /// Fatal at construction: tree not bifurcating, alignment/tree name mismatch,
    /// a row not `3*nsites` long, an unrecognized codon, non-scalar/non-vector
    /// free parameter shape.
    Structural { message: ErrString },

    /// Fatal at mutation: wrong-length flat array, an assignment key that is not
    /// a model free parameter, or vector-parameter components missing/duplicated
    /// during inversion.
    InvalidParameter { message: ErrString },

    /// Fatal at evaluation: overflow, underflow, division by zero, or an invalid
    /// operation during the recursion or root reduction.
    Numerical { message: ErrString },

    /// Whatever the bounded optimizer reports, surfaced without interpretation.
    Optimizer { message: ErrString },

    Multiple(MultiDisplay),

    Context {
        context: ErrorContext,
        source: Box<EngineError>,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Structural { .. } => ErrorCode::Structural,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Self::Numerical { .. } => ErrorCode::Numerical,
            Self::Optimizer { .. } => ErrorCode::Optimizer,
            Self::Multiple(_) => ErrorCode::Multiple,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        EngineError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural { message } => write!(f, "structural error: {}", message),
            Self::InvalidParameter { message } => write!(f, "invalid parameter: {}", message),
            Self::Numerical { message } => write!(f, "numerical error: {}", message),
            Self::Optimizer { message } => write!(f, "optimizer error: {}", message),
            Self::Multiple(m) => write!(f, "multiple errors:\n{}", m),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

#[derive(Debug)]
pub struct MultiDisplay(Vec<EngineError>);

impl Display for MultiDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "[{}] {} (code: {:?})", i, e, e.code())?;
        }
        Ok(())
    }
}

impl From<Vec<EngineError>> for MultiDisplay {
    fn from(v: Vec<EngineError>) -> Self {
        Self(v)
    }
}

pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> EngineResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> EngineResult<T>;
}

impl<T, E: Into<EngineError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> EngineResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> EngineResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! engine_err {
    (Structural: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::EngineError::Structural { message: format!($fmt, $($arg),*).into() })
    };
    (InvalidParameter: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::EngineError::InvalidParameter { message: format!($fmt, $($arg),*).into() })
    };
    (Numerical: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::EngineError::Numerical { message: format!($fmt, $($arg),*).into() })
    };
    (Optimizer: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::EngineError::Optimizer { message: format!($fmt, $($arg),*).into() })
    };
    ($variant:ident: $msg:expr $(,)?) => {{
        $crate::__private::must_use($crate::EngineError::Structural { message: $msg.into() })
    }};
}

#[macro_export]
macro_rules! engine_bail {
    ($($tt:tt)+) => { return Err($crate::engine_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::engine_bail!($($tt)+); }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_structural_error() {
        let err = engine_err!(Structural: "tree has {} tips, expected {}", 3, 4);
        assert_eq!(err.code(), ErrorCode::Structural);
        assert!(err.to_string().contains("tree has 3 tips"));
    }

    #[test]
    fn context_chains_source() {
        let err = engine_err!(Numerical: "sitelik underflowed at site {}", 2)
            .with_context("recomputing likelihood kernel");
        assert_eq!(err.code(), ErrorCode::Context);
        assert!(err.to_string().contains("Caused by"));
    }
}
