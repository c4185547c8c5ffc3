//! Tunables for capturing and formatting.

use alloc::string::String;
use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Tunables for [`capture_with`] and [`format_with`].
///
/// [`capture`] and [`format`] use the process-wide value returned by
/// [`Settings::global`], which starts out as [`Settings::DEFAULT`].
///
/// [`capture`]: crate::capture
/// [`capture_with`]: crate::capture_with
/// [`format`]: crate::format
/// [`format_with`]: crate::format_with
///
/// # Examples
///
/// ```
/// use btw::Settings;
///
/// let settings = Settings {
///     max_column_width: 40,
///     ..Settings::DEFAULT
/// };
/// let report = btw::format_with(&*btw::attach(std::fmt::Error, ["k", "v"]), &settings);
/// assert!(report.starts_with("error: "));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Maximum number of frames recorded by a single capture.
    pub max_stack_depth: usize,
    /// Keys and values longer than this many characters are printed in full
    /// but do not widen their column.
    pub max_column_width: usize,
}

static MAX_STACK_DEPTH: AtomicUsize = AtomicUsize::new(Settings::DEFAULT.max_stack_depth);
static MAX_COLUMN_WIDTH: AtomicUsize = AtomicUsize::new(Settings::DEFAULT.max_column_width);

impl Settings {
    /// 256 frames, 25 character columns.
    pub const DEFAULT: Self = Self {
        max_stack_depth: 256,
        max_column_width: 25,
    };

    /// The process-wide settings used by [`capture`] and [`format`].
    ///
    /// [`capture`]: crate::capture
    /// [`format`]: crate::format
    #[must_use]
    pub fn global() -> Self {
        Self {
            max_stack_depth: MAX_STACK_DEPTH.load(Ordering::Relaxed),
            max_column_width: MAX_COLUMN_WIDTH.load(Ordering::Relaxed),
        }
    }

    /// Replaces the process-wide settings. Affects subsequent captures and
    /// formats only.
    pub fn set_global(self) {
        MAX_STACK_DEPTH.store(self.max_stack_depth, Ordering::Relaxed);
        MAX_COLUMN_WIDTH.store(self.max_column_width, Ordering::Relaxed);
    }

    /// Reads settings from the environment.
    ///
    /// - `BTW_MAX_STACK_DEPTH` - maximum number of captured frames
    /// - `BTW_MAX_COLUMN_WIDTH` - column width cap for context alignment
    ///
    /// Unset variables keep their [default](Self::DEFAULT) values.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSettingError`] if a variable is set but is not a
    /// non-negative integer.
    #[cfg(feature = "std")]
    #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
    pub fn from_env() -> Result<Self, InvalidSettingError> {
        Self::from_lookup(|name| {
            std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
        })
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, InvalidSettingError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut settings = Self::DEFAULT;
        if let Some(depth) = parse_var(&lookup, "BTW_MAX_STACK_DEPTH")? {
            settings.max_stack_depth = depth;
        }
        if let Some(width) = parse_var(&lookup, "BTW_MAX_COLUMN_WIDTH")? {
            settings.max_column_width = width;
        }
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn parse_var<F>(lookup: &F, variable: &'static str) -> Result<Option<usize>, InvalidSettingError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let Some(value) = lookup(variable) else {
        return Ok(None);
    };
    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(InvalidSettingError { variable, value }),
    }
}

/// An environment variable held a value that is not a valid setting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidSettingError {
    /// Name of the offending variable.
    pub variable: &'static str,
    /// The value it held.
    pub value: String,
}

impl fmt::Display for InvalidSettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid value {:?} for {}: expected a non-negative integer",
            self.value, self.variable
        )
    }
}

impl core::error::Error for InvalidSettingError {}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec::Vec};

    use super::*;

    fn lookup_from(vars: &[(&'static str, &'static str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: Vec<(&'static str, &'static str)> = vars.to_vec();
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Settings::default(), Settings::DEFAULT);
        assert_eq!(Settings::DEFAULT.max_stack_depth, 256);
        assert_eq!(Settings::DEFAULT.max_column_width, 25);
    }

    #[test]
    fn test_lookup_without_variables() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, Settings::DEFAULT);
    }

    #[test]
    fn test_lookup_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("BTW_MAX_STACK_DEPTH", "32"),
            ("BTW_MAX_COLUMN_WIDTH", " 10 "),
        ]))
        .unwrap();
        assert_eq!(
            settings,
            Settings {
                max_stack_depth: 32,
                max_column_width: 10,
            }
        );
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = Settings::from_lookup(lookup_from(&[("BTW_MAX_COLUMN_WIDTH", "wide")]))
            .unwrap_err();
        assert_eq!(err.variable, "BTW_MAX_COLUMN_WIDTH");
        assert_eq!(err.value, "wide");
        assert_eq!(
            err.to_string(),
            "invalid value \"wide\" for BTW_MAX_COLUMN_WIDTH: expected a non-negative integer"
        );
    }
}
