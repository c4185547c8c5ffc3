#![cfg(feature = "backtrace")]

use btw::{AnnotatedError, BacktraceInspector, BoxError, Frame, Settings, StackInspector};

#[derive(Debug, thiserror::Error)]
#[error("timed out")]
struct Timeout;

fn annotated(err: &BoxError) -> &AnnotatedError {
    err.downcast_ref::<AnnotatedError>()
        .expect("error should be annotated")
}

fn position_of(stack: &[Frame], name: &str) -> Option<usize> {
    stack
        .iter()
        .position(|frame| frame.func.ends_with(&format!("::{name}")))
}

#[inline(never)]
fn origin() -> BoxError {
    btw::capture(Timeout)
}

#[inline(never)]
fn caller_of_origin() -> BoxError {
    std::hint::black_box(origin())
}

#[test]
fn test_stack_starts_at_caller() {
    let err = caller_of_origin();
    let stack = annotated(&err).stack();

    assert_eq!(position_of(stack, "origin"), Some(0));
    assert_eq!(position_of(stack, "caller_of_origin"), Some(1));
    assert!(stack[0].file.ends_with("backtrace_capture.rs"));
    assert!(stack[0].line > 0);

    for frame in stack {
        assert!(!frame.func.starts_with("backtrace::"), "{}", frame.func);
        assert!(!frame.func.contains("btw::annotate"), "{}", frame.func);
    }
}

#[test]
fn test_stack_depth_is_bounded() {
    let settings = Settings {
        max_stack_depth: 2,
        ..Settings::DEFAULT
    };
    let err = btw::capture_with(Timeout, &settings, &BacktraceInspector::DEFAULT);
    assert!(annotated(&err).stack().len() <= 2);

    let settings = Settings {
        max_stack_depth: 0,
        ..Settings::DEFAULT
    };
    let err = btw::capture_with(Timeout, &settings, &BacktraceInspector::DEFAULT);
    assert!(annotated(&err).stack().is_empty());
}

#[inline(never)]
fn recurse(depth: usize) -> BoxError {
    if depth == 0 {
        btw::capture(Timeout)
    } else {
        std::hint::black_box(recurse(depth - 1))
    }
}

#[test]
fn test_recursion_collapses_in_report() {
    let err = recurse(3);
    let report = btw::format_with(&*err, &Settings::DEFAULT);

    assert!(report.starts_with("error: timed out\n\tfrom recurse() at "));
    assert!(report.contains("\n\t     ... * 3\n"), "{report}");
}

#[inline(never)]
fn annotate_here() -> BoxError {
    btw::attach(Timeout, ["op", "read"])
}

#[test]
fn test_attach_resolves_caller() {
    let err = annotate_here();
    let layer = &annotated(&err).context()[0];
    assert!(layer.func().ends_with("::annotate_here"), "{}", layer.func());

    let report = btw::format_with(&*err, &Settings::DEFAULT);
    assert_eq!(report, "error: timed out\n\t[ op ]    read    by annotate_here()");
}

#[test]
fn test_caller_name_skips_frames() {
    #[inline(never)]
    fn outer() -> Option<String> {
        std::hint::black_box(inner())
    }

    #[inline(never)]
    fn inner() -> Option<String> {
        BacktraceInspector::DEFAULT.caller_name(1)
    }

    let name = outer().expect("frames should resolve in test builds");
    assert!(name.ends_with("::outer"), "{name}");
}
