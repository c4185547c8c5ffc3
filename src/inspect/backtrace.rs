//! Stack inspection backed by the `backtrace` crate.
//!
//! # Environment Variables
//!
//! - `RUST_BACKTRACE=full` - keeps runtime frames at the bottom of the stack
//!   and shows full file paths
//! - `BTW_BACKTRACE` - comma-separated options:
//!   - `full_paths` - show full file paths
//!
//! # Path privacy
//!
//! Paths into the standard library and the cargo registry are shortened to
//! the part below the crate directory. Paths of your own code are recorded as
//! the compiler saw them; use `--remap-path-prefix` when building release
//! binaries if that exposes more of the build machine than you want.

use alloc::{
    borrow::Cow,
    format,
    string::{String, ToString},
    vec::Vec,
};
use std::sync::OnceLock;

use backtrace::BytesOrWideString;

use super::StackInspector;
use crate::Frame;

const UNKNOWN_FILE: &str = "???";

/// A [`StackInspector`] that walks the real call stack.
///
/// Frames need symbol information to be useful. Release builds should keep
/// debug info around:
///
/// ```toml
/// [profile.release]
/// debug = "line-tables-only"
/// ```
///
/// # Examples
///
/// ```
/// use btw::{BacktraceInspector, StackInspector};
///
/// let inspector = BacktraceInspector::DEFAULT;
/// let frames = inspector.current_frames(0, 8);
/// assert!(frames.len() <= 8);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct BacktraceInspector {
    /// Crates whose frames are dropped from the bottom of a captured stack.
    pub skipped_final_crates: &'static [&'static str],
    /// Whether to record full paths for standard library and cargo registry
    /// frames instead of the shortened crate-relative form.
    pub show_full_path: bool,
}

impl BacktraceInspector {
    /// Trims `std`, `core` and `alloc` frames from the bottom of the stack
    /// and shortens library paths.
    pub const DEFAULT: Self = Self {
        skipped_final_crates: &["std", "core", "alloc"],
        show_full_path: false,
    };

    /// Records every frame with its full path.
    pub const FULL: Self = Self {
        skipped_final_crates: &[],
        show_full_path: true,
    };

    /// Creates an inspector configured by `RUST_BACKTRACE` and
    /// `BTW_BACKTRACE`.
    ///
    /// `RUST_BACKTRACE=full` gives [`FULL`](Self::FULL). Otherwise the result
    /// is [`DEFAULT`](Self::DEFAULT), with full paths if `BTW_BACKTRACE`
    /// contains `full_paths`.
    #[must_use]
    pub fn new_from_env() -> Self {
        let env_options = EnvOptions::get();
        if env_options.rust_backtrace_full {
            Self::FULL
        } else {
            Self {
                show_full_path: env_options.show_full_path,
                ..Self::DEFAULT
            }
        }
    }

    fn walk(&self, skip: usize, max_depth: usize) -> Vec<ResolvedFrame> {
        let mut frames: Vec<ResolvedFrame> = Vec::new();
        let mut skipper = LeadingFrames::new(skip);

        if max_depth == 0 {
            return frames;
        }

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                if frames.len() >= max_depth {
                    return;
                }

                // Frames without a symbol name carry nothing worth showing.
                let Some(sym) = symbol.name() else {
                    return;
                };
                let func = format!("{sym:#}");

                if !skipper.keep(&func) {
                    return;
                }

                let frame_path = symbol.filename_raw().map(FramePath::new);
                frames.push(ResolvedFrame {
                    frame: Frame {
                        func,
                        file: frame_path.as_ref().map_or_else(
                            || UNKNOWN_FILE.to_string(),
                            |path| path.display(self.show_full_path).to_string(),
                        ),
                        line: symbol.lineno().unwrap_or(0),
                    },
                    crate_name: frame_path.and_then(|path| path.crate_name),
                });
            });

            frames.len() < max_depth
        });

        frames
    }

    /// Turns the walked frames into [`Frame`]s.
    ///
    /// Runtime frames are only trimmed when the walk ended at the bottom of
    /// the stack. A walk cut short by `max_depth` may end in the middle of
    /// `core` or `alloc` code that belongs to the caller.
    fn finish(&self, mut frames: Vec<ResolvedFrame>, max_depth: usize) -> Vec<Frame> {
        if frames.len() < max_depth {
            self.trim_runtime_frames(&mut frames);
        }
        frames.into_iter().map(|resolved| resolved.frame).collect()
    }

    fn trim_runtime_frames(&self, frames: &mut Vec<ResolvedFrame>) {
        while let Some(last) = frames.last() {
            let from_skipped_crate = last
                .crate_name
                .as_ref()
                .is_some_and(|name| self.skipped_final_crates.contains(&&**name));
            let libc_start = matches!(
                last.frame.func.as_str(),
                "__libc_start_call_main" | "__libc_start_main_impl" | "__libc_start_main" | "_start"
            );

            if from_skipped_crate || (libc_start && !self.skipped_final_crates.is_empty()) {
                frames.pop();
            } else {
                break;
            }
        }
    }
}

impl Default for BacktraceInspector {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl StackInspector for BacktraceInspector {
    #[inline(never)]
    fn current_frames(&self, skip: usize, max_depth: usize) -> Vec<Frame> {
        self.finish(self.walk(skip, max_depth), max_depth)
    }

    #[inline(never)]
    fn caller_name(&self, skip: usize) -> Option<String> {
        self.walk(skip, 1)
            .into_iter()
            .next()
            .map(|resolved| resolved.frame.func)
    }
}

/// Frames of the stack walker and of this module sit above the caller.
fn is_inspector_frame(func: &str) -> bool {
    func.starts_with("backtrace::")
        || func.starts_with("_Unwind_")
        || func.contains(module_path!())
}

/// Decides which of the leading frames of a walk are reported.
///
/// Inspector frames are dropped until the first other frame, then `skip`
/// more frames are dropped. Only symbol names are looked at, so builds
/// without line tables still report frames.
struct LeadingFrames {
    inside_inspector: bool,
    remaining_skip: usize,
}

impl LeadingFrames {
    fn new(skip: usize) -> Self {
        Self {
            inside_inspector: true,
            remaining_skip: skip,
        }
    }

    fn keep(&mut self, func: &str) -> bool {
        if self.inside_inspector {
            if is_inspector_frame(func) {
                return false;
            }
            self.inside_inspector = false;
        }

        if self.remaining_skip > 0 {
            self.remaining_skip -= 1;
            return false;
        }

        true
    }
}

struct ResolvedFrame {
    frame: Frame,
    crate_name: Option<Cow<'static, str>>,
}

/// File path information for a stack frame.
#[derive(Debug)]
struct FramePath {
    raw_path: String,
    crate_name: Option<Cow<'static, str>>,
    /// The path below the crate directory, for recognised library paths.
    suffix: Option<String>,
}

impl FramePath {
    fn new(path: BytesOrWideString<'_>) -> Self {
        static REGEXES: OnceLock<[regex::Regex; 2]> = OnceLock::new();
        let [std_regex, registry_regex] = REGEXES.get_or_init(|| {
            [
                // Matches Rust standard library paths:
                // - /lib/rustlib/src/rust/library/{std|core|alloc}/src/...
                // - /rustc/{40-char-hash}/library/{std|core|alloc}/src/...
                regex::Regex::new(
                    r"(?:/lib/rustlib/src/rust|^/rustc/[0-9a-f]{40})/library/(std|core|alloc)/src/.*$",
                )
                .expect("built-in regex pattern for std library paths should be valid"),
                // Matches Cargo registry paths:
                // - /.cargo/registry/src/{index}-{16-char-hash}/{crate}-{version}/src/...
                regex::Regex::new(
                    r"/\.cargo/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/.*$",
                )
                .expect("built-in regex pattern for cargo registry paths should be valid"),
            ]
        });

        let raw_path = path.to_str_lossy().into_owned();

        let crate_capture = std_regex
            .captures(&raw_path)
            .or_else(|| registry_regex.captures(&raw_path))
            .and_then(|captures| captures.get(1));

        match crate_capture {
            Some(crate_capture) => {
                let crate_name = crate_capture.as_str().to_string();
                let suffix = raw_path[crate_capture.start()..].to_string();
                Self {
                    crate_name: Some(crate_name.into()),
                    suffix: Some(suffix),
                    raw_path,
                }
            }
            None => Self {
                raw_path,
                crate_name: None,
                suffix: None,
            },
        }
    }

    fn display(&self, show_full_path: bool) -> &str {
        match &self.suffix {
            Some(suffix) if !show_full_path => suffix,
            _ => &self.raw_path,
        }
    }
}

#[derive(Debug)]
struct EnvOptions {
    rust_backtrace_full: bool,
    show_full_path: bool,
}

impl EnvOptions {
    fn get() -> &'static Self {
        static BTW_FLAGS: OnceLock<EnvOptions> = OnceLock::new();

        BTW_FLAGS.get_or_init(|| {
            let rust_backtrace_full =
                std::env::var_os("RUST_BACKTRACE").is_some_and(|var| var == "full");
            let mut show_full_path = rust_backtrace_full;
            if let Some(var) = std::env::var_os("BTW_BACKTRACE") {
                for v in var.to_string_lossy().split(',') {
                    if v.trim().eq_ignore_ascii_case("full_paths") {
                        show_full_path = true;
                    }
                }
            }
            EnvOptions {
                rust_backtrace_full,
                show_full_path,
            }
        })
    }
}
