use reqpin_util::errors::ReqpinError;

#[test]
fn test_io_error_display() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err = ReqpinError::from(io_err);
    assert!(err.to_string().contains("I/O error"), "got: {err}");
}

#[test]
fn test_config_error_display() {
    let err = ReqpinError::Config {
        message: "bad syntax".to_string(),
    };
    assert_eq!(err.to_string(), "Configuration error: bad syntax");
}

#[test]
fn test_requirements_error_display() {
    let err = ReqpinError::Requirements {
        message: "reqs.txt:3: unexpected character".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Requirements error: reqs.txt:3: unexpected character"
    );
}

#[test]
fn test_repository_error_display() {
    let err = ReqpinError::Repository {
        message: "solution file is not annotated".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Repository error: solution file is not annotated"
    );
}

#[test]
fn test_generic_error_display() {
    let err = ReqpinError::Generic {
        message: "something broke".to_string(),
    };
    assert_eq!(err.to_string(), "something broke");
}

#[test]
fn test_io_error_from_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: ReqpinError = io_err.into();
    assert!(matches!(err, ReqpinError::Io(_)));
}
