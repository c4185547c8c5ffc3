//! The annotated error value and its parts.

use alloc::{string::String, vec::Vec};
use core::{error::Error, fmt};

use crate::BoxError;

/// An error wrapped together with a captured call stack and any number of
/// context layers.
///
/// An `AnnotatedError` is created by [`capture`] (which records the stack) or
/// by the first [`attach`] on a plain error (which leaves the stack empty).
/// Further attaches append [`Layer`]s to the same value.
///
/// Its message is the message of the wrapped error, and [`Error::source`]
/// returns the wrapped error, so generic chain-walking code sees straight
/// through it.
///
/// [`capture`]: crate::capture
/// [`attach`]: crate::attach
#[derive(Debug)]
pub struct AnnotatedError {
    cause: BoxError,
    stack: Vec<Frame>,
    context: Vec<Layer>,
}

/// One entry of a captured call stack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Fully qualified name of the function.
    pub func: String,
    /// Source file of the call site.
    pub file: String,
    /// Line number of the call site.
    pub line: u32,
}

/// The context contributed by a single attach call.
///
/// Values alternate between keys and values. The number of values is always
/// even: an unpaired trailing value is dropped on construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Layer {
    pub(crate) func: String,
    values: Vec<String>,
}

impl AnnotatedError {
    /// Wraps `cause` without a stack or any context.
    #[must_use]
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self::with_stack(cause.into(), Vec::new())
    }

    pub(crate) fn with_stack(cause: BoxError, stack: Vec<Frame>) -> Self {
        Self {
            cause,
            stack,
            context: Vec::new(),
        }
    }

    /// The wrapped error.
    #[must_use]
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.cause
    }

    /// Consumes the annotation and returns the wrapped error.
    #[must_use]
    pub fn into_cause(self) -> BoxError {
        self.cause
    }

    /// The captured stack, innermost frame first. Empty if no stack was
    /// captured.
    #[must_use]
    pub fn stack(&self) -> &[Frame] {
        &self.stack
    }

    /// The context layers, oldest first.
    #[must_use]
    pub fn context(&self) -> &[Layer] {
        &self.context
    }

    /// Appends a layer. Layers without any pairs are ignored.
    pub fn push_layer(&mut self, layer: Layer) {
        if !layer.is_empty() {
            self.context.push(layer);
        }
    }
}

impl fmt::Display for AnnotatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cause, f)
    }
}

impl Error for AnnotatedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.cause)
    }
}

impl Frame {
    /// Creates a frame.
    #[must_use]
    pub fn new(func: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            func: func.into(),
            file: file.into(),
            line,
        }
    }
}

impl Layer {
    /// Creates a layer attributed to `func`.
    ///
    /// `values` alternate key, value, key, value. A trailing unpaired value is
    /// dropped.
    #[must_use]
    pub fn new<I, S>(func: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.truncate(values.len() / 2 * 2);
        Self {
            func: func.into(),
            values,
        }
    }

    /// Fully qualified name of the function that attached this layer.
    #[must_use]
    pub fn func(&self) -> &str {
        &self.func
    }

    /// The flattened key/value list.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Iterates over `(key, value)` pairs in attach order.
    pub fn pairs(&self) -> impl ExactSizeIterator<Item = (&str, &str)> {
        self.values
            .chunks_exact(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }

    /// Returns `true` if the layer holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
