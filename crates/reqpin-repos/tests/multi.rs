use std::cell::Cell;
use std::rc::Rc;

use reqpin_core::{DistInfo, RepositoryId, Requirement, Version};
use reqpin_repos::{
    Candidate, MemoryRepository, MultiRepository, Repository, RepositoryError,
    RepositoryInitializationError,
};

fn dist(name: &str, version: &str) -> DistInfo {
    DistInfo::new(name, Version::parse(version).unwrap(), vec![])
}

struct Counting {
    inner: MemoryRepository,
    closes: Rc<Cell<usize>>,
}

impl Repository for Counting {
    fn identity(&self) -> RepositoryId {
        self.inner.identity()
    }

    fn get_candidates(&mut self, req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError> {
        self.inner.get_candidates(req)
    }

    fn resolve_candidate(&mut self, candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError> {
        self.inner.resolve_candidate(candidate)
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get() + 1);
    }
}

struct Broken;

impl Repository for Broken {
    fn identity(&self) -> RepositoryId {
        RepositoryId::new("broken", "test")
    }

    fn get_candidates(&mut self, _req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError> {
        Err(RepositoryError::Network {
            url: "http://broken".to_string(),
            message: "offline".to_string(),
        })
    }

    fn resolve_candidate(&mut self, _candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError> {
        unreachable!()
    }
}

#[test]
fn test_candidates_in_registration_order() {
    let mut multi = MultiRepository::new()
        .with(MemoryRepository::new("first", [dist("a", "1.0")]))
        .unwrap()
        .with(MemoryRepository::new("second", [dist("a", "2.0")]))
        .unwrap();
    let req = Requirement::parse("a").unwrap();
    let candidates = multi.get_candidates(Some(&req)).unwrap();
    let versions: Vec<String> = candidates.iter().map(|c| c.version.to_string()).collect();
    assert_eq!(versions, vec!["1.0", "2.0"]);

    let (resolved, _) = multi.resolve_candidate(&candidates[1]).unwrap();
    assert_eq!(resolved.origin, Some(RepositoryId::new("memory", "second")));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut multi = MultiRepository::new();
    multi.add(Box::new(MemoryRepository::new("same", Vec::<DistInfo>::new()))).unwrap();
    let err = multi.add(Box::new(MemoryRepository::new("same", [dist("x", "1")])));
    assert!(matches!(err, Err(RepositoryInitializationError::Duplicate { .. })));
    assert_eq!(multi.len(), 1);
}

#[test]
fn test_close_reaches_each_member_once() {
    let closes = Rc::new(Cell::new(0));
    let mut multi = MultiRepository::new();
    for label in ["one", "two"] {
        multi
            .add(Box::new(Counting {
                inner: MemoryRepository::new(label, Vec::<DistInfo>::new()),
                closes: closes.clone(),
            }))
            .unwrap();
    }
    multi.close();
    multi.close();
    assert!(multi.is_closed());
    assert_eq!(closes.get(), 2);
}

#[test]
fn test_dropping_closes_members() {
    let closes = Rc::new(Cell::new(0));
    let counting = |label: &str| Counting {
        inner: MemoryRepository::new(label, Vec::<DistInfo>::new()),
        closes: closes.clone(),
    };

    let multi = MultiRepository::new().with(counting("one")).unwrap();
    drop(multi);
    assert_eq!(closes.get(), 1);

    let mut multi = MultiRepository::new().with(counting("two")).unwrap();
    multi.close();
    drop(multi);
    assert_eq!(closes.get(), 2);
}

#[test]
fn test_failing_member_is_skipped() {
    let mut multi = MultiRepository::new()
        .with(Broken)
        .unwrap()
        .with(MemoryRepository::new("ok", [dist("a", "1.0")]))
        .unwrap();
    let req = Requirement::parse("a").unwrap();
    assert_eq!(multi.get_candidates(Some(&req)).unwrap().len(), 1);

    let mut only_broken = MultiRepository::new().with(Broken).unwrap();
    assert!(only_broken.get_candidates(Some(&req)).is_err());
}

#[test]
fn test_equality_is_identity() {
    let a: Box<dyn Repository> = Box::new(MemoryRepository::new("x", Vec::<DistInfo>::new()));
    let b: Box<dyn Repository> = Box::new(MemoryRepository::new("x", [dist("a", "1")]));
    let c: Box<dyn Repository> = Box::new(MemoryRepository::new("y", Vec::<DistInfo>::new()));
    assert!(*a == *b);
    assert!(*a != *c);
}
