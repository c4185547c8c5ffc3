use alloc::string::String;

use crate::{
    BoxError, Settings,
    annotate::{attach_impl, capture_impl},
    inspect::GlobalInspector,
};

mod sealed {
    pub trait Sealed {}
    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension methods annotating the error of a [`Result`].
///
/// `Ok` values pass through untouched, and nothing is recorded for them.
///
/// This trait is sealed and cannot be implemented outside of this crate.
///
/// # Examples
///
/// ```
/// use btw::prelude::*;
///
/// fn parse(input: &str) -> Result<u16, BoxError> {
///     let port = input.parse::<u16>().capture()?;
///     Ok(port)
/// }
///
/// fn port(input: &str) -> Result<u16, BoxError> {
///     parse(input).attach(["input", input])
/// }
///
/// assert_eq!(port("8080").unwrap(), 8080);
///
/// let err = port("eighty").unwrap_err();
/// let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
/// assert_eq!(annotated.context()[0].values(), ["input", "eighty"]);
/// ```
pub trait ResultExt<T, E>: sealed::Sealed {
    /// Like [`capture`](crate::capture), applied to the error.
    ///
    /// The captured stack starts at the caller of this method.
    #[must_use]
    fn capture(self) -> Result<T, BoxError>
    where
        E: Into<BoxError>;

    /// Like [`attach`](crate::attach), applied to the error.
    ///
    /// The layer is attributed to the caller of this method.
    #[must_use]
    fn attach<I, S>(self, ctx: I) -> Result<T, BoxError>
    where
        E: Into<BoxError>,
        I: IntoIterator<Item = S>,
        S: Into<String>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    #[inline(never)]
    fn capture(self) -> Result<T, BoxError>
    where
        E: Into<BoxError>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => {
                let global = GlobalInspector::get();
                Err(capture_impl(e.into(), &Settings::global(), global.inspector()))
            }
        }
    }

    #[inline(never)]
    fn attach<I, S>(self, ctx: I) -> Result<T, BoxError>
    where
        E: Into<BoxError>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => {
                let global = GlobalInspector::get();
                Err(attach_impl(e.into(), ctx, global.inspector()))
            }
        }
    }
}
