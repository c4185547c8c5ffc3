#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Tracing span context for `btw` annotated errors.
//!
//! The fields of the spans you are in when an error passes by are often
//! exactly the context you would otherwise attach by hand. This crate turns
//! them into `btw` context layers.
//!
//! # How It Works
//!
//! You add [`ContextLayer`] to your tracing subscriber alongside your existing
//! layers. It records the field values of every span as plain strings. When
//! you call [`attach_spans`] (or [`SpanExt::attach_spans`]), every span in the
//! current scope with recorded fields becomes one [`btw::Layer`], innermost
//! span first, attributed to the span's name.
//!
//! # Quick Start
//!
//! ```
//! use btw::BoxError;
//! use btw_tracing::{ContextLayer, SpanExt};
//! use tracing_subscriber::{Registry, layer::SubscriberExt};
//!
//! let subscriber = Registry::default()
//!     .with(ContextLayer)
//!     .with(tracing_subscriber::fmt::layer());
//! tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
//!
//! #[tracing::instrument(fields(user = "alice"))]
//! fn sync(attempt: u32) -> Result<(), BoxError> {
//!     Err(std::io::Error::other("connection reset")).attach_spans()
//! }
//!
//! let err = sync(2).unwrap_err();
//! println!("{}", btw::format(&*err));
//! ```
//!
//! Output:
//! ```text
//! error: connection reset
//!     [ attempt ]        2    by sync()
//!     [ user    ]    alice
//! ```
//!
//! # Environment Variables
//!
//! - `BTW_TRACING` - Comma-separated options:
//!   - `innermost` - Only attach the innermost span

use std::{fmt, sync::OnceLock};

use btw::BoxError;
use tracing::{
    Span,
    field::{Field, Visit},
    span::{Attributes, Id, Record},
};
use tracing_subscriber::{Registry, layer::Context, registry::LookupSpan};

/// Field values recorded for a span, alternating key and value.
#[derive(Clone, Debug, Default)]
struct SpanFields(Vec<String>);

impl SpanFields {
    fn set(&mut self, key: &str, value: String) {
        match self.0.chunks_exact_mut(2).find(|pair| pair[0] == key) {
            Some(pair) => pair[1] = value,
            None => {
                self.0.push(key.to_string());
                self.0.push(value);
            }
        }
    }
}

impl Visit for SpanFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.set(field.name(), format!("{value:?}"));
    }
}

/// A tracing layer that records span field values for [`attach_spans`].
///
/// **Required for btw-tracing.** Without it spans are still found, but carry
/// no fields and so contribute nothing.
///
/// # Examples
///
/// ```
/// use btw_tracing::ContextLayer;
/// use tracing_subscriber::{Registry, layer::SubscriberExt};
///
/// let subscriber = Registry::default()
///     .with(ContextLayer)
///     .with(tracing_subscriber::fmt::layer());
///
/// tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct ContextLayer;

impl<S> tracing_subscriber::Layer<S> for ContextLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => values.record(fields),
            None => {
                let mut fields = SpanFields::default();
                values.record(&mut fields);
                extensions.insert(fields);
            }
        }
    }
}

/// Turns the spans in scope into context layers.
///
/// # Examples
///
/// ```
/// use btw_tracing::SpanAttacher;
///
/// let attacher = SpanAttacher {
///     innermost_only: true,
/// };
/// let err = attacher.attach(std::io::Error::other("connection reset"));
/// assert!(err.is::<btw::AnnotatedError>());
/// ```
#[derive(Copy, Clone, Debug)]
pub struct SpanAttacher {
    /// Whether to attach only the innermost span instead of the whole scope.
    pub innermost_only: bool,
}

#[derive(Debug)]
struct BtwTracingEnvOptions {
    innermost_only: bool,
}

impl BtwTracingEnvOptions {
    fn get() -> &'static Self {
        static BTW_TRACING_FLAGS: OnceLock<BtwTracingEnvOptions> = OnceLock::new();

        BTW_TRACING_FLAGS.get_or_init(|| {
            let mut innermost_only = false;

            if let Some(var) = std::env::var_os("BTW_TRACING") {
                for v in var.to_string_lossy().split(',') {
                    if v.trim().eq_ignore_ascii_case("innermost") {
                        innermost_only = true;
                    }
                }
            }

            BtwTracingEnvOptions { innermost_only }
        })
    }
}

impl SpanAttacher {
    /// Creates a [`SpanAttacher`] configured by the `BTW_TRACING` environment
    /// variable.
    #[must_use]
    pub fn new() -> Self {
        Self {
            innermost_only: BtwTracingEnvOptions::get().innermost_only,
        }
    }

    /// Appends one layer per span in the current scope to `err`.
    ///
    /// Layers are appended innermost span first. Spans without recorded
    /// fields are skipped. A plain error is wrapped into an
    /// [`AnnotatedError`](btw::AnnotatedError) even if no span contributes.
    #[must_use]
    pub fn attach<E>(&self, err: E) -> BoxError
    where
        E: Into<BoxError>,
    {
        self.current_layers()
            .into_iter()
            .fold(btw::attach_layer(err, btw::Layer::default()), btw::attach_layer)
    }

    fn current_layers(&self) -> Vec<btw::Layer> {
        let layers = Span::current().with_subscriber(|(span_id, dispatch)| {
            let Some(registry) = dispatch.downcast_ref::<Registry>() else {
                return Vec::new();
            };
            let Some(span_ref) = registry.span(span_id) else {
                return Vec::new();
            };

            let limit = if self.innermost_only { 1 } else { usize::MAX };
            span_ref
                .scope()
                .take(limit)
                .filter_map(|span| {
                    let extensions = span.extensions();
                    let fields = extensions.get::<SpanFields>()?;
                    let layer = btw::Layer::new(span.name(), fields.0.iter().cloned());
                    (!layer.is_empty()).then_some(layer)
                })
                .collect()
        });

        layers.unwrap_or_default()
    }
}

impl Default for SpanAttacher {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends the spans in the current scope to `err` as context layers.
///
/// Equivalent to `SpanAttacher::new().attach(err)`.
///
/// # Examples
///
/// ```
/// use btw_tracing::ContextLayer;
/// use tracing_subscriber::{Registry, layer::SubscriberExt};
///
/// let subscriber = Registry::default().with(ContextLayer);
/// tracing::subscriber::with_default(subscriber, || {
///     let _guard = tracing::info_span!("load", file = "x.txt").entered();
///     let err = btw_tracing::attach_spans(std::io::Error::other("disk full"));
///     assert!(btw::format(&*err).contains("[ file ]    x.txt    by load()"));
/// });
/// ```
#[must_use]
pub fn attach_spans<E>(err: E) -> BoxError
where
    E: Into<BoxError>,
{
    SpanAttacher::new().attach(err)
}

mod sealed {
    pub trait Sealed {}
    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension trait attaching the current span scope to the error of a
/// [`Result`].
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait SpanExt<T>: sealed::Sealed {
    /// Applies [`attach_spans`] to the error. `Ok` values pass through.
    #[must_use]
    fn attach_spans(self) -> Result<T, BoxError>;
}

impl<T, E> SpanExt<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    fn attach_spans(self) -> Result<T, BoxError> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(attach_spans(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use btw::AnnotatedError;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("timed out")]
    struct Timeout;

    fn with_context_layer<R>(f: impl FnOnce() -> R) -> R {
        tracing::subscriber::with_default(Registry::default().with(ContextLayer), f)
    }

    fn context(err: &BoxError) -> Vec<(String, Vec<String>)> {
        err.downcast_ref::<AnnotatedError>()
            .expect("error should be annotated")
            .context()
            .iter()
            .map(|layer| (layer.func().to_string(), layer.values().to_vec()))
            .collect()
    }

    #[test]
    fn test_spans_attached_innermost_first() {
        let err = with_context_layer(|| {
            let _request = tracing::info_span!("request", user = "alice").entered();
            let _load = tracing::info_span!("load", path = "x.txt", attempt = 2).entered();
            attach_spans(Timeout)
        });

        assert_eq!(
            context(&err),
            vec![
                (
                    "load".to_string(),
                    vec![
                        "path".to_string(),
                        "x.txt".to_string(),
                        "attempt".to_string(),
                        "2".to_string()
                    ]
                ),
                (
                    "request".to_string(),
                    vec!["user".to_string(), "alice".to_string()]
                ),
            ]
        );
        assert_eq!(
            btw::format_with(&*err, &btw::Settings::DEFAULT),
            "error: timed out\n\
             \t[ path    ]    x.txt    by load()\n\
             \t[ attempt ]        2\n\
             \t[ user    ]    alice    by request()"
        );
    }

    #[test]
    fn test_spans_without_fields_are_skipped() {
        let err = with_context_layer(|| {
            let _outer = tracing::info_span!("outer", job = 42).entered();
            let _inner = tracing::info_span!("inner").entered();
            attach_spans(Timeout)
        });

        assert_eq!(
            context(&err),
            vec![("outer".to_string(), vec!["job".to_string(), "42".to_string()])]
        );
    }

    #[test]
    fn test_innermost_only() {
        let err = with_context_layer(|| {
            let _outer = tracing::info_span!("outer", job = 42).entered();
            let _inner = tracing::info_span!("inner", step = "fetch").entered();
            SpanAttacher {
                innermost_only: true,
            }
            .attach(Timeout)
        });

        assert_eq!(
            context(&err),
            vec![("inner".to_string(), vec!["step".to_string(), "fetch".to_string()])]
        );
    }

    #[test]
    fn test_recorded_fields_update() {
        let err = with_context_layer(|| {
            let span = tracing::info_span!("login", user = tracing::field::Empty, tries = 1);
            span.record("tries", 2);
            span.record("user", "bob");
            let _guard = span.entered();
            attach_spans(Timeout)
        });

        assert_eq!(
            context(&err),
            vec![(
                "login".to_string(),
                vec![
                    "tries".to_string(),
                    "2".to_string(),
                    "user".to_string(),
                    "bob".to_string()
                ]
            )]
        );
    }

    #[test]
    fn test_without_subscriber_only_wraps() {
        let err = attach_spans(Timeout);
        assert!(context(&err).is_empty());
        assert_eq!(err.to_string(), "timed out");
    }

    #[test]
    fn test_result_ext() {
        #[tracing::instrument(fields(job = "sync"))]
        fn run(retries: u32) -> Result<(), BoxError> {
            Err(Timeout).attach_spans()
        }

        let ok: Result<u8, Timeout> = Ok(1);
        assert_eq!(with_context_layer(|| ok.attach_spans()).unwrap(), 1);

        let err = with_context_layer(|| run(3)).unwrap_err();
        let layers = context(&err);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].0, "run");

        let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
        let pairs: Vec<(&str, &str)> = annotated.context()[0].pairs().collect();
        assert_eq!(pairs, [("retries", "3"), ("job", "sync")]);
        assert_eq!(
            btw::format_with(&*err, &btw::Settings::DEFAULT),
            "error: timed out\n\t[ retries ]       3    by run()\n\t[ job     ]    sync"
        );
    }

    #[test]
    fn test_appends_to_existing_annotation() {
        let err = with_context_layer(|| {
            let _guard = tracing::info_span!("save", file = "x.txt").entered();
            let err = btw::attach_layer(Timeout, btw::Layer::new("app::write", ["block", "12"]));
            attach_spans(err)
        });

        let layers = context(&err);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].0, "app::write");
        assert_eq!(layers[1].0, "save");
    }
}
