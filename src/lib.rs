#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Capture a stack trace where an error starts, attach context on the way
//! up, print it all at the top.
//!
//! ## Overview
//!
//! `btw` is a deliberately small error-annotation library. It does three
//! things:
//!
//! 1. [`capture`] wraps an error in an [`AnnotatedError`] and records the call
//!    stack at the point where the error first showed up.
//! 2. [`attach!`] (or [`attach`]) adds a layer of key/value context to an
//!    error as it propagates. Each layer remembers which function attached it.
//! 3. [`format`] renders the error message, every captured stack and every
//!    context layer in the error chain into one report.
//!
//! ## Quick Example
//!
//! ```
//! use btw::prelude::*;
//!
//! fn open(path: &str) -> Result<Vec<u8>, BoxError> {
//!     let bytes = std::fs::read(path).capture()?;
//!     Ok(bytes)
//! }
//!
//! fn load(path: &str) -> Result<Vec<u8>, BoxError> {
//!     open(path).map_err(|err| btw::attach!(err, "path", path, "attempt", 1))
//! }
//!
//! if let Err(err) = load("/definitely/not/here") {
//!     let report = btw::format(&*err);
//!     assert!(report.starts_with("error: "));
//!     assert!(report.contains("[ path    ]"));
//! }
//! ```
//!
//! A typical report looks like this:
//!
//! ```text
//! error: No such file or directory (os error 2)
//!     from open() at src/main.rs:4
//!     from load() at src/main.rs:9
//!     from main() at src/main.rs:13
//!     [ path    ]    /definitely/not/here    by load::{{closure}}()
//!     [ attempt ]                       1
//! ```
//!
//! ## Chains
//!
//! Annotated errors can wrap other annotated errors, possibly with ordinary
//! errors in between. [`format`] follows [`Error::source`] all the way down
//! and renders every annotated link with one more level of indentation.
//!
//! [`Error::source`]: core::error::Error::source
//!
//! ## Stack traces
//!
//! Stack capture goes through a [`StackInspector`]. With the `backtrace`
//! feature (enabled by default) the global inspector is a
//! [`BacktraceInspector`]; without it, stacks are empty and caller names fall
//! back to `"???"`. Custom inspectors can be passed explicitly to
//! [`capture_with`] and [`attach_with`], or installed globally with
//! [`install_stack_inspector`].
//!
//! ## Configuration
//!
//! [`Settings`] carries the two tunables: the maximum captured stack depth and
//! the column width cap used when aligning context. [`capture`] and [`format`]
//! use the global settings, [`capture_with`] and [`format_with`] take them
//! explicitly.

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

mod annotate;
mod annotated;
mod format;
pub mod inspect;
mod names;
pub mod prelude;
mod result_ext;
mod settings;

pub use self::{
    annotate::{attach, attach_layer, attach_with, capture, capture_with},
    annotated::{AnnotatedError, Frame, Layer},
    format::{Formatted, format, format_with},
    inspect::{
        InspectorAlreadyInstalledError, NoopInspector, StackInspector, install_stack_inspector,
        replace_stack_inspector,
    },
    result_ext::ResultExt,
    settings::{InvalidSettingError, Settings},
};

#[cfg(feature = "backtrace")]
pub use self::inspect::backtrace::BacktraceInspector;

/// The erased error type used throughout the crate.
///
/// Any `E: Error + Send + Sync + 'static`, as well as `&str` and `String`,
/// converts into it with `?` or [`Into`].
pub type BoxError = alloc::boxed::Box<dyn core::error::Error + Send + Sync + 'static>;

/// Placeholder used when the name of an attaching function cannot be
/// resolved.
pub const UNKNOWN_FUNCTION: &str = "???";

// Not public API. Referenced by macro-generated code.
#[doc(hidden)]
pub mod __private {
    use alloc::{string::String, vec::Vec};

    #[doc(hidden)]
    pub use alloc::vec;
    #[doc(hidden)]
    pub use core::any::type_name_of_val;

    use crate::{BoxError, Layer};

    /// Strips the name of the marker item the macro defines from a
    /// `type_name_of_val` result, leaving the enclosing function's path.
    #[doc(hidden)]
    #[must_use]
    pub fn enclosing_function(marker: &'static str) -> &'static str {
        marker.strip_suffix("::__btw_here").unwrap_or(marker)
    }

    #[doc(hidden)]
    #[must_use]
    pub fn attach_rendered<E>(err: E, func: &'static str, values: Vec<String>) -> BoxError
    where
        E: Into<BoxError>,
    {
        crate::attach_layer(err, Layer::new(func, values))
    }

    #[doc(hidden)]
    pub mod kind {
        use alloc::string::{String, ToString};
        use core::fmt;

        #[doc(hidden)]
        pub struct Wrap<'a, T: ?Sized>(pub &'a T);

        #[doc(hidden)]
        pub trait RenderDisplayKind {
            fn render(&self) -> String;
        }

        impl<T: fmt::Display + ?Sized> RenderDisplayKind for &Wrap<'_, T> {
            #[inline]
            fn render(&self) -> String {
                self.0.to_string()
            }
        }

        #[doc(hidden)]
        pub trait RenderDebugKind {
            fn render(&self) -> String;
        }

        impl<T: fmt::Debug + ?Sized> RenderDebugKind for Wrap<'_, T> {
            #[inline]
            fn render(&self) -> String {
                alloc::format!("{:?}", self.0)
            }
        }
    }
}
