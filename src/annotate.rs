//! Capturing stacks and attaching context.
//!
//! Every public entry point here is `#[inline(never)]` and calls straight into
//! one of the `*_impl` helpers. The helpers therefore know exactly how many
//! frames (their own plus the entry point's) sit between them and the user's
//! code.

use alloc::{boxed::Box, string::String};

use crate::{
    AnnotatedError, BoxError, Layer, Settings, StackInspector, UNKNOWN_FUNCTION,
    inspect::GlobalInspector,
};

/// Frames between a `*_impl` helper's call into the inspector and the code
/// that called the public entry point: the helper and the entry point.
pub(crate) const ENTRY_FRAMES: usize = 2;

/// Wraps `err` in a fresh [`AnnotatedError`] holding the current call stack.
///
/// The stack starts at the function that called `capture`, innermost frame
/// first, and holds at most [`Settings::global`]`().max_stack_depth` frames.
/// It is recorded with the global [`StackInspector`].
///
/// Capturing always wraps, even if `err` is already annotated, so call it
/// once where an error originates. For results, [`ResultExt::capture`]
/// passes `Ok` values through untouched.
///
/// [`ResultExt::capture`]: crate::ResultExt::capture
///
/// # Examples
///
/// ```
/// use btw::AnnotatedError;
///
/// let err = btw::capture(std::io::Error::other("disk full"));
/// assert_eq!(err.to_string(), "disk full");
///
/// let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
/// assert!(annotated.cause().is::<std::io::Error>());
/// assert!(annotated.context().is_empty());
/// ```
#[inline(never)]
#[must_use]
pub fn capture<E>(err: E) -> BoxError
where
    E: Into<BoxError>,
{
    let global = GlobalInspector::get();
    capture_impl(err.into(), &Settings::global(), global.inspector())
}

/// Like [`capture`], with explicit settings and inspector.
#[inline(never)]
#[must_use]
pub fn capture_with<E>(err: E, settings: &Settings, inspector: &dyn StackInspector) -> BoxError
where
    E: Into<BoxError>,
{
    capture_impl(err.into(), settings, inspector)
}

/// Appends a layer of context to `err`, attributed to the calling function.
///
/// `ctx` alternates keys and values, already rendered to strings (the
/// [`attach!`] macro renders arbitrary values for you). An unpaired trailing
/// element is dropped.
///
/// If the outermost error is already an [`AnnotatedError`] the layer is
/// appended to it; otherwise the error is wrapped in a new one with an empty
/// stack. Attaching never captures a stack. Without any pairs no layer is
/// added, but a plain error is still wrapped.
///
/// The calling function's name comes from the global [`StackInspector`] and
/// falls back to [`UNKNOWN_FUNCTION`].
///
/// # Examples
///
/// ```
/// use btw::AnnotatedError;
///
/// let err = btw::attach(std::io::Error::other("disk full"), ["op", "write", "file", "x.txt"]);
/// let err = btw::attach(err, ["op", "write", "retries", "3"]);
///
/// let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
/// assert_eq!(annotated.context().len(), 2);
/// assert!(annotated.stack().is_empty());
/// ```
#[inline(never)]
#[must_use]
pub fn attach<E, I, S>(err: E, ctx: I) -> BoxError
where
    E: Into<BoxError>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let global = GlobalInspector::get();
    attach_impl(err.into(), ctx, global.inspector())
}

/// Like [`attach`], resolving the caller's name with `inspector`.
#[inline(never)]
#[must_use]
pub fn attach_with<E, I, S>(err: E, ctx: I, inspector: &dyn StackInspector) -> BoxError
where
    E: Into<BoxError>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    attach_impl(err.into(), ctx, inspector)
}

/// Appends a prebuilt [`Layer`] to `err`, wrapping it first if it is not
/// already annotated. Empty layers are not appended.
#[must_use]
pub fn attach_layer<E>(err: E, layer: Layer) -> BoxError
where
    E: Into<BoxError>,
{
    let mut annotated = into_annotated(err.into());
    annotated.push_layer(layer);
    annotated
}

#[inline(never)]
pub(crate) fn capture_impl(
    err: BoxError,
    settings: &Settings,
    inspector: &dyn StackInspector,
) -> BoxError {
    let mut stack = inspector.current_frames(ENTRY_FRAMES, settings.max_stack_depth);
    // Inspectors are not trusted to honour the bound.
    stack.truncate(settings.max_stack_depth);
    Box::new(AnnotatedError::with_stack(err, stack))
}

#[inline(never)]
pub(crate) fn attach_impl<I, S>(err: BoxError, ctx: I, inspector: &dyn StackInspector) -> BoxError
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut annotated = into_annotated(err);
    let mut layer = Layer::new(String::new(), ctx);
    if !layer.is_empty() {
        layer.func = inspector
            .caller_name(ENTRY_FRAMES)
            .unwrap_or_else(|| String::from(UNKNOWN_FUNCTION));
        annotated.push_layer(layer);
    }
    annotated
}

fn into_annotated(err: BoxError) -> Box<AnnotatedError> {
    match err.downcast::<AnnotatedError>() {
        Ok(annotated) => annotated,
        Err(err) => Box::new(AnnotatedError::with_stack(err, alloc::vec::Vec::new())),
    }
}
