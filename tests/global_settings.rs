use btw::{AnnotatedError, Settings};

#[derive(Debug, thiserror::Error)]
#[error("timed out")]
struct Timeout;

#[test]
fn test_global_settings_apply_to_capture_and_format() {
    assert_eq!(Settings::global(), Settings::DEFAULT);

    Settings {
        max_stack_depth: 1,
        max_column_width: 3,
    }
    .set_global();

    let err = btw::capture(Timeout);
    let err = btw::attach!(err, "key", "long value", "k", "v");
    let annotated = err.downcast_ref::<AnnotatedError>().unwrap();
    assert!(annotated.stack().len() <= 1);

    let report = btw::format(&*err);
    assert!(report.contains("\n\t[ key ]    long value    by "), "{report}");
    assert!(report.contains("\n\t[ k   ]    v"), "{report}");
    assert_eq!(report, btw::Formatted::new(&*err).to_string());

    Settings::DEFAULT.set_global();
    assert_eq!(Settings::global(), Settings::DEFAULT);
}
