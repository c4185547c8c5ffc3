use btw::{AnnotatedError, Frame, NoopInspector, StackInspector};

#[derive(Debug, thiserror::Error)]
#[error("timed out")]
struct Timeout;

struct Canned;

impl StackInspector for Canned {
    fn current_frames(&self, _skip: usize, max_depth: usize) -> Vec<Frame> {
        [
            Frame::new("app::B", "file.go", 10),
            Frame::new("app::A", "file.go", 20),
        ]
        .into_iter()
        .take(max_depth)
        .collect()
    }

    fn caller_name(&self, _skip: usize) -> Option<String> {
        Some("app::handler".to_string())
    }
}

#[test]
fn test_installed_inspector_is_used_globally() {
    btw::install_stack_inspector(Canned).expect("no inspector installed yet");

    let err = btw::capture(Timeout);
    assert_eq!(
        btw::format(&*err),
        "error: timed out\n\tfrom B() at file.go:10\n\tfrom A() at file.go:20"
    );

    let err = btw::attach(Timeout, ["k", "v"]);
    let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
    assert_eq!(annotated.context()[0].func(), "app::handler");

    let rejected = btw::install_stack_inspector(NoopInspector).unwrap_err();
    assert_eq!(
        rejected.to_string(),
        "a stack inspector is already installed globally"
    );

    let previous = btw::replace_stack_inspector(NoopInspector);
    assert!(previous.is_some());

    let err = btw::capture(Timeout);
    let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
    assert!(annotated.stack().is_empty());

    let err = btw::attach(Timeout, ["k", "v"]);
    let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
    assert_eq!(annotated.context()[0].func(), btw::UNKNOWN_FUNCTION);
}
