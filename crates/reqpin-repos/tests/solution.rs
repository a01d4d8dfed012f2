use std::path::Path;

use reqpin_core::{Requirement, RepositoryId};
use reqpin_repos::{Repository, RepositoryInitializationError, SolutionRepository};

const SOLUTION: &str = "\
# pinned by reqpin
six==1.16.0  # requirements.in
urllib3==2.0.7  # [incomplete] requests (<3,>=1.21.1)
requests==2.31.0  # requirements.in (>=2)
";

fn repo(excluded: &[&str]) -> SolutionRepository {
    let excluded: Vec<String> = excluded.iter().map(|s| s.to_string()).collect();
    SolutionRepository::from_text(SOLUTION, Path::new("requirements.txt"), &excluded).unwrap()
}

#[test]
fn test_candidates_follow_file_order() {
    let mut repo = repo(&[]);
    let all: Vec<String> = repo
        .get_candidates(None)
        .unwrap()
        .iter()
        .map(|c| format!("{}=={}", c.name, c.version))
        .collect();
    assert_eq!(all, vec!["six==1.16.0", "urllib3==2.0.7", "requests==2.31.0"]);
    assert!(all.iter().all(|c| !c.starts_with("requirements")));
}

#[test]
fn test_resolve_returns_recorded_requirements() {
    let mut repo = repo(&[]);
    let req = Requirement::parse("Requests").unwrap();
    let candidate = repo.get_candidates(Some(&req)).unwrap().remove(0);
    let (dist, complete) = repo.resolve_candidate(&candidate).unwrap();
    assert!(complete);
    assert_eq!(dist.origin, Some(RepositoryId::new("solution", "requirements.txt")));
    let reqs: Vec<String> = dist.requirements.iter().map(ToString::to_string).collect();
    assert_eq!(reqs, vec!["urllib3>=1.21.1,<3"]);
}

#[test]
fn test_incomplete_flag_is_reported() {
    let mut repo = repo(&[]);
    let req = Requirement::parse("urllib3").unwrap();
    let candidate = repo.get_candidates(Some(&req)).unwrap().remove(0);
    let (_, complete) = repo.resolve_candidate(&candidate).unwrap();
    assert!(!complete);
}

#[test]
fn test_excluded_names_are_not_offered() {
    let mut repo = repo(&["URLLIB3"]);
    let req = Requirement::parse("urllib3").unwrap();
    assert!(repo.get_candidates(Some(&req)).unwrap().is_empty());
}

#[test]
fn test_listing_ignores_exclusions() {
    let mut repo = repo(&["urllib3"]);
    let all = repo.get_candidates(None).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().any(|c| c.name == "urllib3"));
}

#[test]
fn test_unannotated_file_is_rejected() {
    let result = SolutionRepository::from_text("six==1.16.0\n", Path::new("old.txt"), &[]);
    match result {
        Err(RepositoryInitializationError::Unannotated { line, text, .. }) => {
            assert_eq!(line, 1);
            assert_eq!(text, "six==1.16.0");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("unannotated solution accepted"),
    }
}

#[test]
fn test_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requirements.txt");
    std::fs::write(&path, SOLUTION).unwrap();
    let repo = SolutionRepository::load(&path, &[]).unwrap();
    assert_eq!(repo.path(), path);
    assert!(repo.graph().get("six", None).is_some());

    let missing = SolutionRepository::load(&dir.path().join("nope.txt"), &[]);
    assert!(matches!(missing, Err(RepositoryInitializationError::Io { .. })));
}
