/// Attach a layer of key/value context to an error.
///
/// The first argument is the error (anything that converts into
/// [`BoxError`]), followed by alternating keys and values. Every key and value
/// is rendered to a string on the spot: types implementing [`Display`] use it,
/// anything else falls back to [`Debug`], which prints structs with their
/// field names.
///
/// The layer is attributed to the function the macro is expanded in. The name
/// is resolved at compile time, so it is available even in builds without
/// debug information.
///
/// An unpaired trailing argument is dropped, and a call without any pairs adds
/// no layer (it still wraps a plain error into an [`AnnotatedError`]).
///
/// [`BoxError`]: crate::BoxError
/// [`AnnotatedError`]: crate::AnnotatedError
/// [`Display`]: core::fmt::Display
/// [`Debug`]: core::fmt::Debug
///
/// # Examples
///
/// ```
/// use btw::{AnnotatedError, BoxError};
///
/// #[derive(Debug)]
/// struct Request {
///     id: u32,
/// }
///
/// fn handle() -> BoxError {
///     let err = std::io::Error::other("connection reset");
///     btw::attach!(err, "peer", "10.0.0.7", "request", Request { id: 7 })
/// }
///
/// let err = handle();
/// let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
/// let layer = &annotated.context()[0];
/// assert!(layer.func().ends_with("handle"));
/// assert_eq!(layer.values(), ["peer", "10.0.0.7", "request", "Request { id: 7 }"]);
/// ```
#[macro_export]
macro_rules! attach {
    ($err:expr $(,)?) => {
        $crate::attach_layer($err, $crate::Layer::default())
    };
    ($err:expr, $($value:expr),+ $(,)?) => {
        {
            use $crate::__private::kind::*;
            fn __btw_here() {}
            let func = $crate::__private::enclosing_function(
                $crate::__private::type_name_of_val(&__btw_here),
            );
            let values = $crate::__private::vec![$((&&Wrap(&$value)).render()),+];
            $crate::__private::attach_rendered($err, func, values)
        }
    };
}
