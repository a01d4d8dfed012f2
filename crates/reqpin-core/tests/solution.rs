use reqpin_core::solution::{load_solution, render_solution, SolutionError};
use reqpin_core::{MergeCache, RepositoryId};

const SOLUTION: &str = "\
bar==2.0  # requirements.in
baz==1.0  # requirements.in
foo==1.2.3  # bar (>=1.0), baz
";

#[test]
fn test_sources_become_reverse_edges() {
    let mut cache = MergeCache::new();
    let graph = load_solution("foo==1.2.3 # bar (>=1.0), baz\nbar==2.0 # -\nbaz==1.0 # -\n", None, &mut cache)
        .unwrap();

    let foo = graph.get("foo", None).unwrap();
    let bar = graph.get("bar", None).unwrap();
    let baz = graph.get("baz", None).unwrap();

    let dependents = graph.dependents_of(foo);
    assert_eq!(dependents.len(), 2);
    let from_bar = dependents.iter().find(|(id, _)| *id == bar).unwrap();
    assert_eq!(from_bar.1.specifier.to_string(), ">=1.0");
    let from_baz = dependents.iter().find(|(id, _)| *id == baz).unwrap();
    assert!(from_baz.1.specifier.is_empty());
}

#[test]
fn test_finalize_records_requirements_in_metadata() {
    let mut cache = MergeCache::new();
    let graph = load_solution(SOLUTION, None, &mut cache).unwrap();
    let bar = graph.get("bar", None).unwrap();
    let reqs: Vec<String> = graph
        .node(bar)
        .metadata
        .as_ref()
        .unwrap()
        .requirements
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(reqs, vec!["foo>=1.0"]);
}

#[test]
fn test_round_trip() {
    let mut cache = MergeCache::new();
    let graph = load_solution(SOLUTION, None, &mut cache).unwrap();
    assert_eq!(render_solution(&graph), SOLUTION);

    let reloaded = load_solution(&render_solution(&graph), None, &mut cache).unwrap();
    let keys: Vec<String> = graph.nodes().map(|(_, n)| n.key.to_string()).collect();
    let reloaded_keys: Vec<String> = reloaded.nodes().map(|(_, n)| n.key.to_string()).collect();
    assert_eq!(keys, reloaded_keys);
    for (id, node) in graph.nodes() {
        let other = reloaded.get(node.key.name.as_str(), node.key.extra.as_deref()).unwrap();
        assert_eq!(
            graph.build_constraints(id, &mut cache).unwrap(),
            reloaded.build_constraints(other, &mut cache).unwrap()
        );
    }
}

#[test]
fn test_round_trip_with_extras_and_flags() {
    let text = "\
a[test]==1.0  # [incomplete] -
pytest==8.0  # a[test] (>=7)
";
    let mut cache = MergeCache::new();
    let graph = load_solution(text, None, &mut cache).unwrap();
    assert_eq!(render_solution(&graph), text);

    let a = graph.get("a", None).unwrap();
    assert!(!graph.node(a).complete);
    let variant = graph.get("a", Some("test")).unwrap();
    let reqs: Vec<String> = graph
        .node(variant)
        .metadata
        .as_ref()
        .unwrap()
        .requirements
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(reqs, vec!["pytest>=7; extra==\"test\""]);
}

#[test]
fn test_sources_are_sorted_and_deduplicated() {
    let text = "foo==1.0  # zed, bar, zed\nbar==1.0  # -\nzed==1.0  # -\n";
    let mut cache = MergeCache::new();
    let graph = load_solution(text, None, &mut cache).unwrap();
    let rendered = render_solution(&graph);
    assert!(rendered.contains("foo==1.0  # bar, zed\n"));
}

#[test]
fn test_comments_and_blank_lines_ignored() {
    let text = "# pinned by reqpin\n\nfoo==1.0  # -\n";
    let mut cache = MergeCache::new();
    let graph = load_solution(text, None, &mut cache).unwrap();
    assert_eq!(render_solution(&graph), "foo==1.0  # -\n");
}

#[test]
fn test_origin_is_recorded() {
    let origin = RepositoryId::new("solution", "locked.txt");
    let mut cache = MergeCache::new();
    let graph = load_solution("foo==1.0  # -\n", Some(&origin), &mut cache).unwrap();
    let foo = graph.get("foo", None).unwrap();
    assert_eq!(graph.node(foo).metadata.as_ref().unwrap().origin, Some(origin));
}

#[test]
fn test_unannotated_rejected() {
    let mut cache = MergeCache::new();
    let err = load_solution("foo==1.0  # -\nbar==2.0\n", None, &mut cache).unwrap_err();
    assert!(matches!(err, SolutionError::Unannotated { line: 2, .. }));
}

#[test]
fn test_unpinned_rejected() {
    let mut cache = MergeCache::new();
    let err = load_solution("foo>=1.0  # -\n", None, &mut cache).unwrap_err();
    assert!(matches!(err, SolutionError::NotPinned { line: 1, .. }));
}

#[test]
fn test_inconsistent_constraint_rejected() {
    let mut cache = MergeCache::new();
    let err = load_solution("bar==1.0  # -\nfoo==1.0  # bar (>=2)\n", None, &mut cache).unwrap_err();
    assert!(matches!(err, SolutionError::Inconsistent { line: 2, .. }));
}

#[test]
fn test_round_trip_keeps_markers() {
    let text = "foo==1.0; python_version<\"3.0\"  # -\n";
    let mut cache = MergeCache::new();
    let graph = load_solution(text, None, &mut cache).unwrap();
    assert_eq!(render_solution(&graph), text);
}

#[test]
fn test_duplicate_pin_rejected() {
    let mut cache = MergeCache::new();
    let err = load_solution("foo==1.0  # -\nFoo==2.0  # req.txt\n", None, &mut cache).unwrap_err();
    assert!(
        matches!(err, SolutionError::Duplicate { line: 2, first: 1, .. }),
        "{err:?}"
    );
}
