//! The Outcome container: a success value or a structured failure.
//!
//! The agent loop never raises. Every step (fetch, completion, dispatch)
//! returns an `Outcome`, and callers check-and-return instead of unwinding.
//! An `Outcome` holds exactly one branch and is immutable once built.
//!
//! Inside a function that composes several steps, convert with
//! [`Outcome::into_result`] and use `?`; convert back at the boundary with
//! `Outcome::from`.

use crate::error::{ErrorKind, Failure};

/// Either a value or a [`Failure`], never both and never neither.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an Outcome may carry a failure that should be propagated"]
pub struct Outcome<T> {
    inner: Result<T, Failure>,
}

impl<T> Outcome<T> {
    /// A successful outcome carrying `value`.
    pub fn success(value: T) -> Self {
        Self { inner: Ok(value) }
    }

    /// A failed outcome of the given kind.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::from_failure(Failure::new(kind, message))
    }

    /// A failed outcome carrying an already-built failure.
    pub fn from_failure(failure: Failure) -> Self {
        Self {
            inner: Err(failure),
        }
    }

    /// Borrow both branches as a `(value, error)` pair.
    ///
    /// Exactly one side is `Some`. Calling this any number of times yields the
    /// same pair.
    pub fn unpack(&self) -> (Option<&T>, Option<&Failure>) {
        match &self.inner {
            Ok(value) => (Some(value), None),
            Err(failure) => (None, Some(failure)),
        }
    }

    /// Owning variant of [`unpack`](Self::unpack).
    pub fn into_parts(self) -> (Option<T>, Option<Failure>) {
        match self.inner {
            Ok(value) => (Some(value), None),
            Err(failure) => (None, Some(failure)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.inner.is_ok()
    }

    pub fn is_failure(&self) -> bool {
        self.inner.is_err()
    }

    pub fn value(&self) -> Option<&T> {
        self.inner.as_ref().ok()
    }

    pub fn error(&self) -> Option<&Failure> {
        self.inner.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, Failure> {
        self.inner
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            inner: self.inner.map(f),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self.inner {
            Ok(value) => f(value),
            Err(failure) => Outcome::from_failure(failure),
        }
    }
}

impl<T, E: Into<Failure>> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        Self {
            inner: result.map_err(Into::into),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, Failure> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.inner
    }
}
