use std::fs;

use reqpin_core::reqfile::{ReqfileError, RequirementsFile};
use tempfile::TempDir;

fn names(reqs: &[reqpin_core::Requirement]) -> Vec<String> {
    reqs.iter().map(ToString::to_string).collect()
}

#[test]
fn test_includes_resolve_relative_to_file() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("reqs")).unwrap();
    fs::write(
        tmp.path().join("reqs/base.txt"),
        "requests>=2\n-c constraints.txt\n",
    )
    .unwrap();
    fs::write(tmp.path().join("reqs/constraints.txt"), "urllib3<2\n").unwrap();
    fs::write(
        tmp.path().join("requirements.in"),
        "# top level\n-r reqs/base.txt\n--extra-index-url https://example.com\nrequests<3  # cap\nflask\n",
    )
    .unwrap();

    let file = RequirementsFile::load(&tmp.path().join("requirements.in")).unwrap();
    assert_eq!(names(&file.requirements), vec!["requests>=2,<3", "flask"]);
    assert_eq!(names(&file.constraints), vec!["urllib3<2"]);
}

#[test]
fn test_include_cycle_detected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "-r b.txt\n").unwrap();
    fs::write(tmp.path().join("b.txt"), "-r a.txt\n").unwrap();
    let err = RequirementsFile::load(&tmp.path().join("a.txt")).unwrap_err();
    assert!(matches!(err, ReqfileError::IncludeCycle { .. }));
}

#[test]
fn test_missing_include_is_io_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "-r missing.txt\n").unwrap();
    let err = RequirementsFile::load(&tmp.path().join("a.txt")).unwrap_err();
    assert!(matches!(err, ReqfileError::Io { .. }));
}

#[test]
fn test_parse_error_names_file_and_line() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("requirements.in");
    fs::write(&path, "six\n\nnot a requirement!\n").unwrap();
    let err = RequirementsFile::load(&path).unwrap_err();
    match &err {
        ReqfileError::Parse { line, .. } => assert_eq!(*line, 3),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("requirements.in:3"));
}

#[test]
fn test_to_dist_is_meta_root() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("requirements.in");
    fs::write(&path, "six\n").unwrap();
    let dist = RequirementsFile::load(&path).unwrap().to_dist();
    assert!(dist.meta);
    assert!(dist.name.ends_with("requirements.in"));
    assert_eq!(names(&dist.requirements), vec!["six"]);
}
