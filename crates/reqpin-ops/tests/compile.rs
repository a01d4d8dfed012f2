use std::fs;
use std::path::{Path, PathBuf};

use reqpin_ops::ops_compile::{compile, CompileOptions};
use reqpin_ops::ops_why::why;

fn project(root: &Path, dir: &str, name: &str, version: &str, deps: &[&str]) {
    let path = root.join("src").join(dir);
    fs::create_dir_all(&path).unwrap();
    let deps: Vec<String> = deps.iter().map(|d| format!("\"{d}\"")).collect();
    fs::write(
        path.join("pyproject.toml"),
        format!(
            "[project]\nname = \"{name}\"\nversion = \"{version}\"\ndependencies = [{}]\n",
            deps.join(", ")
        ),
    )
    .unwrap();
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    project(dir.path(), "a1", "a", "1.0", &[]);
    project(dir.path(), "a2", "a", "2.0", &["b>=1"]);
    project(dir.path(), "b", "b", "1.0", &[]);
    fs::write(dir.path().join("requirements.in"), "a\n").unwrap();
    dir
}

fn offline() -> CompileOptions {
    CompileOptions {
        sources: vec![PathBuf::from("src")],
        offline: true,
        ..CompileOptions::default()
    }
}

#[test]
fn test_compile_from_sources() {
    let dir = workspace();
    let outcome = compile(dir.path(), &offline()).unwrap();
    assert_eq!(outcome.solution, "a==2.0  # requirements.in\nb==1.0  # a (>=1)\n");
    assert_eq!(outcome.packages, 2);
}

#[test]
fn test_compile_writes_output() {
    let dir = workspace();
    let opts = CompileOptions {
        output: Some(PathBuf::from("requirements.txt")),
        ..offline()
    };
    let outcome = compile(dir.path(), &opts).unwrap();
    let written = fs::read_to_string(dir.path().join("requirements.txt")).unwrap();
    assert_eq!(written, outcome.solution);
}

#[test]
fn test_previous_solution_is_reused_unless_upgraded() {
    let dir = workspace();
    fs::write(dir.path().join("requirements.txt"), "a==1.0  # requirements.in\n").unwrap();

    let opts = CompileOptions {
        solution: Some(PathBuf::from("requirements.txt")),
        ..offline()
    };
    let outcome = compile(dir.path(), &opts).unwrap();
    assert_eq!(outcome.solution, "a==1.0  # requirements.in\n");

    let opts = CompileOptions {
        upgrade: vec!["a".to_string()],
        ..opts
    };
    let outcome = compile(dir.path(), &opts).unwrap();
    assert!(outcome.solution.starts_with("a==2.0"), "{}", outcome.solution);
}

#[test]
fn test_unannotated_solution_is_ignored() {
    let dir = workspace();
    fs::write(dir.path().join("requirements.txt"), "a==1.0\n").unwrap();
    let opts = CompileOptions {
        solution: Some(PathBuf::from("requirements.txt")),
        ..offline()
    };
    let outcome = compile(dir.path(), &opts).unwrap();
    assert!(outcome.solution.starts_with("a==2.0"));
}

#[test]
fn test_constraint_files_limit_versions() {
    let dir = workspace();
    fs::write(dir.path().join("constraints.txt"), "a<2\n").unwrap();
    let opts = CompileOptions {
        constraints: vec![PathBuf::from("constraints.txt")],
        ..offline()
    };
    let outcome = compile(dir.path(), &opts).unwrap();
    assert_eq!(outcome.solution, "a==1.0  # constraints.txt (<2), requirements.in\n");
}

#[test]
fn test_inline_constraints_are_named_after_their_input() {
    let dir = workspace();
    fs::write(dir.path().join("constraints.txt"), "a<2\n").unwrap();
    fs::write(dir.path().join("requirements.in"), "-c constraints.txt\na\n").unwrap();
    let outcome = compile(dir.path(), &offline()).unwrap();
    assert_eq!(outcome.solution, "a==1.0  # requirements.in (<2)\n");
}

#[test]
fn test_extras_apply_to_source_projects() {
    let dir = tempfile::tempdir().unwrap();
    let x = dir.path().join("src").join("x");
    fs::create_dir_all(&x).unwrap();
    fs::write(
        x.join("pyproject.toml"),
        "[project]\nname = \"x\"\nversion = \"1.0\"\n\n[project.optional-dependencies]\ntest = [\"b\"]\n",
    )
    .unwrap();
    project(dir.path(), "b", "b", "1.0", &[]);
    fs::write(dir.path().join("requirements.in"), "x\n").unwrap();

    let opts = CompileOptions {
        extras: vec!["test".to_string()],
        ..offline()
    };
    let outcome = compile(dir.path(), &opts).unwrap();
    assert_eq!(outcome.solution, "b==1.0  # x[test]\nx[test]==1.0  # requirements.in\n");
}

#[test]
fn test_conflict_is_an_error() {
    let dir = workspace();
    fs::write(dir.path().join("requirements.in"), "a>=3\n").unwrap();
    let err = compile(dir.path(), &offline()).unwrap_err();
    assert!(err.to_string().contains("No version of a satisfies"), "{err}");
}

#[test]
fn test_missing_default_input() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile(dir.path(), &offline()).unwrap_err();
    assert!(err.to_string().contains("requirements.in"));
}

#[test]
fn test_offline_without_repositories() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("requirements.in"), "a\n").unwrap();
    let opts = CompileOptions {
        offline: true,
        ..CompileOptions::default()
    };
    let err = compile(dir.path(), &opts).unwrap_err();
    assert!(err.to_string().contains("no repositories"));
}

#[test]
fn test_why_reads_solution() {
    let dir = workspace();
    let opts = CompileOptions {
        output: Some(PathBuf::from("requirements.txt")),
        ..offline()
    };
    compile(dir.path(), &opts).unwrap();

    let tree = why(dir.path(), Path::new("requirements.txt"), "B").unwrap();
    assert!(tree.starts_with("b==1.0\n"), "{tree}");
    assert!(tree.contains("a==2.0 (requires b>=1)"));
    assert!(tree.contains("requirements.in (requires a)"));

    assert!(why(dir.path(), Path::new("requirements.txt"), "zzz").is_err());
}
