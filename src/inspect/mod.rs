//! Call-stack introspection.
//!
//! Capturing a stack and resolving the name of an attaching function both go
//! through a [`StackInspector`]. The crate ships two:
//!
//! - [`BacktraceInspector`] (feature `backtrace`, on by default) walks the
//!   real stack with the [`backtrace`](https://docs.rs/backtrace) crate.
//! - [`NoopInspector`] never finds anything. Stacks come out empty and
//!   caller names fall back to [`UNKNOWN_FUNCTION`].
//!
//! [`capture`] and [`attach`] use the global inspector. Until one is
//! installed with [`install_stack_inspector`] or
//! [`replace_stack_inspector`], that is a [`BacktraceInspector`] configured
//! from the environment, or a [`NoopInspector`] when the `backtrace` feature
//! is disabled.
//!
//! [`BacktraceInspector`]: crate::BacktraceInspector
//! [`UNKNOWN_FUNCTION`]: crate::UNKNOWN_FUNCTION
//! [`capture`]: crate::capture
//! [`attach`]: crate::attach
//!
//! # Writing an inspector
//!
//! ```
//! use btw::{Frame, StackInspector};
//!
//! /// Reports the same two frames no matter where it is called from.
//! struct Canned;
//!
//! impl StackInspector for Canned {
//!     fn current_frames(&self, _skip: usize, max_depth: usize) -> Vec<Frame> {
//!         let mut frames = vec![
//!             Frame::new("app::inner", "src/lib.rs", 10),
//!             Frame::new("app::outer", "src/lib.rs", 20),
//!         ];
//!         frames.truncate(max_depth);
//!         frames
//!     }
//!
//!     fn caller_name(&self, _skip: usize) -> Option<String> {
//!         Some("app::inner".to_string())
//!     }
//! }
//!
//! let err = btw::capture_with(std::fmt::Error, &btw::Settings::DEFAULT, &Canned);
//! assert_eq!(
//!     btw::format(&*err),
//!     "error: an error occurred when formatting an argument\n\
//!      \tfrom inner() at src/lib.rs:10\n\
//!      \tfrom outer() at src/lib.rs:20"
//! );
//! ```

#[cfg(feature = "backtrace")]
pub mod backtrace;

use alloc::{boxed::Box, string::String, vec::Vec};
use core::fmt;
#[cfg(feature = "std")]
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(not(feature = "std"))]
use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Frame;

/// A source of call-stack information.
///
/// `skip` counts frames above the caller of the inspector method: with
/// `skip == 0` the first reported frame is the function that called
/// [`current_frames`](Self::current_frames) or
/// [`caller_name`](Self::caller_name). Frames belonging to the inspector
/// itself are never reported.
pub trait StackInspector: Send + Sync + 'static {
    /// Returns at most `max_depth` frames, innermost first, after skipping
    /// `skip` frames.
    fn current_frames(&self, skip: usize, max_depth: usize) -> Vec<Frame>;

    /// Returns the fully qualified name of the function `skip` frames above
    /// the caller, or `None` if it cannot be resolved.
    fn caller_name(&self, skip: usize) -> Option<String>;
}

/// An inspector that never finds any frames.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopInspector;

impl StackInspector for NoopInspector {
    fn current_frames(&self, _skip: usize, _max_depth: usize) -> Vec<Frame> {
        Vec::new()
    }

    fn caller_name(&self, _skip: usize) -> Option<String> {
        None
    }
}

type Slot = Option<Box<dyn StackInspector>>;

static INSPECTOR: RwLock<Slot> = RwLock::new(None);

fn read_slot() -> RwLockReadGuard<'static, Slot> {
    // A panicking writer cannot leave the slot half-written.
    #[cfg(feature = "std")]
    let guard = INSPECTOR
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    #[cfg(not(feature = "std"))]
    let guard = INSPECTOR.read();

    guard
}

fn write_slot() -> RwLockWriteGuard<'static, Slot> {
    #[cfg(feature = "std")]
    let guard = INSPECTOR
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    #[cfg(not(feature = "std"))]
    let guard = INSPECTOR.write();

    guard
}

/// Installs the global inspector used by [`capture`] and [`attach`].
///
/// [`capture`]: crate::capture
/// [`attach`]: crate::attach
///
/// # Errors
///
/// Fails if an inspector has already been installed, handing the rejected
/// inspector back. Use [`replace_stack_inspector`] to swap it out instead.
///
/// # Examples
///
/// ```
/// use btw::{NoopInspector, install_stack_inspector};
///
/// install_stack_inspector(NoopInspector).expect("no inspector installed yet");
/// assert!(install_stack_inspector(NoopInspector).is_err());
/// ```
pub fn install_stack_inspector<I>(inspector: I) -> Result<(), InspectorAlreadyInstalledError>
where
    I: StackInspector,
{
    let mut slot = write_slot();
    if slot.is_some() {
        return Err(InspectorAlreadyInstalledError(Box::new(inspector)));
    }
    *slot = Some(Box::new(inspector));
    Ok(())
}

/// Installs the global inspector, returning the previously installed one.
pub fn replace_stack_inspector<I>(inspector: I) -> Option<Box<dyn StackInspector>>
where
    I: StackInspector,
{
    write_slot().replace(Box::new(inspector))
}

/// Read access to the global inspector, falling back to the built-in default.
pub(crate) struct GlobalInspector(RwLockReadGuard<'static, Slot>);

impl GlobalInspector {
    pub(crate) fn get() -> Self {
        Self(read_slot())
    }

    pub(crate) fn inspector(&self) -> &dyn StackInspector {
        match self.0.as_ref() {
            Some(inspector) => &**inspector,
            None => default_inspector(),
        }
    }
}

#[cfg(feature = "backtrace")]
fn default_inspector() -> &'static dyn StackInspector {
    static DEFAULT: std::sync::OnceLock<backtrace::BacktraceInspector> =
        std::sync::OnceLock::new();
    DEFAULT.get_or_init(backtrace::BacktraceInspector::new_from_env)
}

#[cfg(not(feature = "backtrace"))]
fn default_inspector() -> &'static dyn StackInspector {
    &NoopInspector
}

/// Returned by [`install_stack_inspector`] when an inspector is already
/// installed. Holds the inspector that was not installed.
pub struct InspectorAlreadyInstalledError(pub Box<dyn StackInspector>);

impl fmt::Debug for InspectorAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InspectorAlreadyInstalledError")
            .finish_non_exhaustive()
    }
}

impl fmt::Display for InspectorAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a stack inspector is already installed globally")
    }
}

impl core::error::Error for InspectorAlreadyInstalledError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_inspector_finds_nothing() {
        assert!(NoopInspector.current_frames(0, 256).is_empty());
        assert_eq!(NoopInspector.caller_name(0), None);
    }

    struct Named;

    impl StackInspector for Named {
        fn current_frames(&self, _skip: usize, _max_depth: usize) -> Vec<Frame> {
            Vec::new()
        }

        fn caller_name(&self, _skip: usize) -> Option<String> {
            Some(String::from("app::named"))
        }
    }

    #[test]
    fn test_global_slot_replace_and_restore() {
        let previous = replace_stack_inspector(Named);
        assert_eq!(
            GlobalInspector::get().inspector().caller_name(0).as_deref(),
            Some("app::named")
        );

        let rejected = install_stack_inspector(NoopInspector).unwrap_err();
        assert_eq!(rejected.0.caller_name(0), None);

        let named = core::mem::replace(&mut *write_slot(), previous);
        assert_eq!(named.unwrap().caller_name(0).as_deref(), Some("app::named"));
    }

    #[test]
    fn test_already_installed_error() {
        use alloc::string::ToString;

        let err = InspectorAlreadyInstalledError(Box::new(NoopInspector));
        assert_eq!(
            err.to_string(),
            "a stack inspector is already installed globally"
        );
        assert!(err.0.current_frames(0, 1).is_empty());
        static_assertions::assert_impl_all!(InspectorAlreadyInstalledError: Send, Sync);
    }
}
