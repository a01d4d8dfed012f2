use std::fs;
use std::path::Path;

use reqpin_core::{DistInfo, Requirement, Version};
use reqpin_repos::{
    ExtractionError, MetadataExtractor, Repository, RepositoryInitializationError, SourceRepository,
};

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn pyproject(name: &str, version: &str, deps: &str) -> String {
    format!(
        r#"
[project]
name = "{name}"
version = "{version}"
dependencies = [{deps}]

[project.optional-dependencies]
test = ["pytest>=7"]
"#
    )
}

fn names(repo: &mut SourceRepository) -> Vec<String> {
    repo.get_candidates(None)
        .unwrap()
        .iter()
        .map(|c| format!("{}=={}", c.name, c.version))
        .collect()
}

struct FixedExtractor;

impl MetadataExtractor for FixedExtractor {
    fn extract(&self, source_dir: &Path) -> Result<DistInfo, ExtractionError> {
        let name = source_dir.file_name().unwrap().to_string_lossy().to_string();
        Ok(DistInfo::new(name, Version::parse("0.1").unwrap(), vec![]))
    }
}

#[test]
fn test_finds_projects_and_reads_static_metadata() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("alpha/pyproject.toml"), &pyproject("alpha", "1.0", "\"beta>=2\""));
    write(&dir.path().join("libs/beta/pyproject.toml"), &pyproject("beta", "2.1", ""));

    let mut repo = SourceRepository::new(dir.path(), &[], None).unwrap();
    assert_eq!(names(&mut repo), vec!["alpha==1.0", "beta==2.1"]);

    let req = Requirement::parse("alpha").unwrap();
    let candidate = repo.get_candidates(Some(&req)).unwrap().remove(0);
    let (dist, complete) = repo.resolve_candidate(&candidate).unwrap();
    assert!(complete);
    let reqs: Vec<String> = dist.requirements.iter().map(ToString::to_string).collect();
    assert_eq!(reqs, vec!["beta>=2", "pytest>=7; extra==\"test\""]);
    assert!(repo.allows_prereleases());
}

#[test]
fn test_skips_special_test_and_package_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("app/pyproject.toml"), &pyproject("app", "1.0", ""));
    write(&root.join("app/tests/fixture/pyproject.toml"), &pyproject("fixture", "1.0", ""));
    write(&root.join("venv/lib/pyproject.toml"), &pyproject("venvpkg", "1.0", ""));
    write(&root.join("build/pyproject.toml"), &pyproject("built", "1.0", ""));
    write(&root.join("pkg/__init__.py"), "");
    write(&root.join("pkg/pyproject.toml"), &pyproject("inner", "1.0", ""));
    write(&root.join("x.egg-info/pyproject.toml"), &pyproject("egg", "1.0", ""));

    let mut repo = SourceRepository::new(root, &[], None).unwrap();
    assert_eq!(names(&mut repo), vec!["app==1.0"]);
}

#[test]
fn test_user_excludes() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("keep/pyproject.toml"), &pyproject("keep", "1.0", ""));
    write(&dir.path().join("vendor/old/pyproject.toml"), &pyproject("old", "1.0", ""));

    let mut repo = SourceRepository::new(dir.path(), &["vendor".to_string()], None).unwrap();
    assert_eq!(names(&mut repo), vec!["keep==1.0"]);
}

#[test]
fn test_missing_version_defaults_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("p/pyproject.toml"),
        "[project]\nname = \"p\"\ndynamic = [\"version\"]\n",
    );
    let mut repo = SourceRepository::new(dir.path(), &[], None).unwrap();
    assert_eq!(names(&mut repo), vec!["p==0"]);
}

#[test]
fn test_setup_py_projects_use_fallback() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("legacy/setup.py"), "from setuptools import setup\nsetup()\n");

    let mut without = SourceRepository::new(dir.path(), &[], None).unwrap();
    assert!(names(&mut without).is_empty());

    let mut with = SourceRepository::new(dir.path(), &[], Some(&FixedExtractor)).unwrap();
    assert_eq!(names(&mut with), vec!["legacy==0.1"]);
}

#[test]
fn test_invalid_metadata_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("bad/pyproject.toml"), "[project\n");
    write(&dir.path().join("good/pyproject.toml"), &pyproject("good", "1.0", ""));
    let mut repo = SourceRepository::new(dir.path(), &[], None).unwrap();
    assert_eq!(names(&mut repo), vec!["good==1.0"]);
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SourceRepository::new(&dir.path().join("nope"), &[], None);
    assert!(matches!(result, Err(RepositoryInitializationError::MissingSource { .. })));
}

#[test]
fn test_invalid_exclude_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let result = SourceRepository::new(dir.path(), &["[".to_string()], None);
    assert!(matches!(result, Err(RepositoryInitializationError::InvalidExclude { .. })));
}
