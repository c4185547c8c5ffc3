//! Rendering an error chain into a report.
//!
//! The report starts with `error: ` and the outermost error's message. Each
//! [`AnnotatedError`] found while following [`Error::source`] then adds its
//! stack and its context, indented by one more tab than the previous
//! annotated link. Links that are not annotated are passed over without
//! affecting the indentation.
//!
//! ```text
//! error: disk full
//!     from write_block() at src/disk.rs:88
//!     from flush() at src/cache.rs:31
//!          ... * 3
//!     [ op   ]    write    by flush()
//!     [ file ]    x.txt
//!         from save() at src/main.rs:12
//!         [ user ]    alice    by save()
//! ```

use alloc::string::String;
use core::{
    error::Error,
    fmt::{self, Write},
};

use hashbrown::HashSet;

use crate::{AnnotatedError, Frame, Layer, Settings, names::base_name};

/// Renders `err` and its chain with the global [`Settings`].
///
/// # Examples
///
/// ```
/// let err = btw::attach(std::io::Error::other("disk full"), ["op", "write"]);
/// let report = btw::format(&*err);
/// assert!(report.starts_with("error: disk full\n\t[ op ]    write    by "));
/// ```
#[must_use]
pub fn format(err: &(dyn Error + 'static)) -> String {
    format_with(err, &Settings::global())
}

/// Renders `err` and its chain with explicit settings.
#[must_use]
pub fn format_with(err: &(dyn Error + 'static), settings: &Settings) -> String {
    let mut report = String::new();
    // Writing into a `String` cannot fail.
    let _ = write_report(&mut report, err, settings);
    report
}

/// A [`Display`](fmt::Display) adapter producing the same report as
/// [`format`].
///
/// # Examples
///
/// ```
/// use btw::{Formatted, Settings};
///
/// let err = btw::capture(std::io::Error::other("disk full"));
/// let narrow = Settings {
///     max_column_width: 8,
///     ..Settings::DEFAULT
/// };
/// println!("{}", Formatted::new(&*err).with_settings(narrow));
/// ```
#[derive(Copy, Clone)]
pub struct Formatted<'a> {
    error: &'a (dyn Error + 'static),
    settings: Option<Settings>,
}

impl<'a> Formatted<'a> {
    /// Formats `error` with the global settings.
    #[must_use]
    pub fn new(error: &'a (dyn Error + 'static)) -> Self {
        Self {
            error,
            settings: None,
        }
    }

    /// Formats with `settings` instead of the global settings.
    #[must_use]
    pub fn with_settings(self, settings: Settings) -> Self {
        Self {
            settings: Some(settings),
            ..self
        }
    }
}

impl fmt::Display for Formatted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.settings.unwrap_or_else(Settings::global);
        write_report(f, self.error, &settings)
    }
}

impl fmt::Debug for Formatted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn write_report(
    out: &mut impl Write,
    err: &(dyn Error + 'static),
    settings: &Settings,
) -> fmt::Result {
    write!(out, "error: {err}")?;

    let mut level = 1;
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(annotated) = err.downcast_ref::<AnnotatedError>() {
            write_stack(out, level, annotated.stack())?;
            write_context(out, level, annotated.context(), settings.max_column_width)?;
            level += 1;
        }
        current = err.source();
    }

    Ok(())
}

struct Indent(usize);

impl fmt::Display for Indent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.0 {
            f.write_char('\t')?;
        }
        Ok(())
    }
}

fn write_stack(out: &mut impl Write, level: usize, stack: &[Frame]) -> fmt::Result {
    let indent = Indent(level);
    let mut previous: Option<&Frame> = None;
    let mut repeats = 0usize;

    for frame in stack {
        if previous.is_some_and(|previous| same_line(previous, frame)) {
            repeats += 1;
            continue;
        }
        if repeats != 0 {
            write!(out, "\n{indent}     ... * {}", repeats + 1)?;
            repeats = 0;
        }
        write!(
            out,
            "\n{indent}from {}() at {}:{}",
            base_name(&frame.func),
            frame.file,
            frame.line
        )?;
        previous = Some(frame);
    }

    if repeats != 0 {
        write!(out, "\n{indent}     ... * {}", repeats + 1)?;
    }

    Ok(())
}

/// Frames whose rendered lines would be identical.
fn same_line(a: &Frame, b: &Frame) -> bool {
    a.line == b.line && a.file == b.file && base_name(&a.func) == base_name(&b.func)
}

fn write_context(
    out: &mut impl Write,
    level: usize,
    context: &[Layer],
    max_column_width: usize,
) -> fmt::Result {
    let indent = Indent(level);

    let mut widths = [0usize; 2];
    for layer in context {
        for (i, item) in layer.values().iter().enumerate() {
            let len = item.chars().count();
            if len <= max_column_width {
                widths[i % 2] = widths[i % 2].max(len);
            }
        }
    }
    let [key_width, value_width] = widths;

    let mut seen: HashSet<&str, rustc_hash::FxBuildHasher> = HashSet::default();
    for layer in context {
        for (position, (key, value)) in layer.pairs().enumerate() {
            if !seen.insert(key) {
                continue;
            }

            write!(out, "\n{indent}[ {key:<key_width$} ]    {value:>value_width$}")?;
            if position == 0 {
                write!(out, "    by {}()", base_name(layer.func()))?;
            }
        }
    }

    Ok(())
}
