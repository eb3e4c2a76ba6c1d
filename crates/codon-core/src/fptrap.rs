//! Scoped floating-point trapping, mirroring Python's
//! `scipy.errstate(over='raise', under='raise', divide='raise', invalid='raise')`
//! context manager: within a scope, overflow/underflow/division-by-zero/NaN
//! is promoted to a [`EngineError::Numerical`] instead of silently
//! propagating. Scoping is thread-local RAII, the same shape as
//! [`crate::random::scoped_seed`].

use std::cell::Cell;

use codon_error::{EngineError, EngineResult, engine_err};

thread_local! {
    static STRICT: Cell<bool> = const { Cell::new(true) };
}

fn is_strict() -> bool {
    STRICT.with(|s| s.get())
}

/// Runs `f` with strict trapping enabled or disabled for its duration,
/// restoring the prior mode afterward even if `f` returns an error.
pub fn scoped_strict<R>(strict: bool, f: impl FnOnce() -> R) -> R {
    let prev = STRICT.with(|s| s.replace(strict));
    let result = f();
    STRICT.with(|s| s.set(prev));
    result
}

/// Checks that `value` is finite, raising [`EngineError::Numerical`] under
/// strict mode. Under relaxed mode, non-finite values pass through untouched.
pub fn check(value: f64, what: &str) -> EngineResult<f64> {
    if is_strict() && !value.is_finite() {
        return Err(engine_err!(
            Numerical: "{} produced a non-finite value ({})",
            what,
            value
        ));
    }
    Ok(value)
}

pub fn checked_ln(x: f64) -> EngineResult<f64> {
    if is_strict() && x <= 0.0 {
        return Err(engine_err!(
            Numerical: "log of non-positive value {}",
            x
        ));
    }
    check(x.ln(), "ln")
}

pub fn checked_div(a: f64, b: f64) -> EngineResult<f64> {
    if is_strict() && b == 0.0 {
        return Err(engine_err!(Numerical: "division by zero ({} / 0)", a));
    }
    check(a / b, "division")
}

#[derive(Debug)]
pub struct Poison(EngineError);

impl Poison {
    pub fn new(err: EngineError) -> Self {
        Self(err)
    }

    pub fn into_inner(self) -> EngineError {
        self.0
    }
}

impl std::fmt::Display for Poison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine poisoned by: {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traps_log_of_zero_in_strict_mode() {
        assert!(checked_ln(0.0).is_err());
    }

    #[test]
    fn relaxed_scope_lets_nan_through() {
        let result = scoped_strict(false, || checked_ln(-1.0));
        assert!(result.unwrap().is_nan());
    }

    #[test]
    fn strict_mode_restored_after_scope() {
        scoped_strict(false, || {});
        assert!(is_strict());
    }

    #[test]
    fn traps_division_by_zero() {
        assert!(checked_div(1.0, 0.0).is_err());
    }
}
