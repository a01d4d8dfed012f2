use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn reqpin_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reqpin").unwrap();
    cmd.env("HOME", home).env_remove("REQPIN_INDEX_URL");
    cmd
}

fn write_project(root: &Path, dir: &str, name: &str, version: &str, deps: &[&str]) {
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

fn sample_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "web", "web", "1.2", &["db>=2", "log"]);
    write_project(tmp.path(), "db", "db", "2.1", &["log<3"]);
    write_project(tmp.path(), "log", "log", "2.5", &[]);
    fs::write(tmp.path().join("requirements.in"), "web\n").unwrap();
    tmp
}

#[test]
fn test_compile_prints_solution() {
    let tmp = sample_tree();

    reqpin_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["compile", "--offline", "--source", "src"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web==1.2  # requirements.in\n"))
        .stdout(predicate::str::contains("db==2.1  # web (>=2)\n"))
        .stdout(predicate::str::contains("log==2.5  # db (<3), web\n"))
        .stderr(predicate::str::contains("Resolved"));
}

#[test]
fn test_compile_writes_output_file() {
    let tmp = sample_tree();

    reqpin_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["compile", "--no-index", "--source", "src", "-o", "requirements.txt"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let solution = fs::read_to_string(tmp.path().join("requirements.txt")).unwrap();
    assert!(solution.starts_with("db==2.1"), "got: {solution}");
}

#[test]
fn test_compile_reads_stdin() {
    let tmp = sample_tree();

    reqpin_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["compile", "--offline", "--source", "src", "-"])
        .write_stdin("log\n")
        .assert()
        .success()
        .stdout(predicate::str::diff("log==2.5  # -\n"));
}

#[test]
fn test_compile_uses_project_config() {
    let tmp = sample_tree();
    fs::write(
        tmp.path().join("reqpin.toml"),
        "[index]\noffline = true\n\n[resolve]\nsources = [\"src\"]\n",
    )
    .unwrap();

    reqpin_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["compile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web==1.2"));
}

#[test]
fn test_compile_conflict_fails() {
    let tmp = sample_tree();
    fs::write(tmp.path().join("requirements.in"), "web\nlog>=3\n").unwrap();

    reqpin_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["compile", "--offline", "--source", "src"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No version of log satisfies"));
}

#[test]
fn test_compile_without_input_fails() {
    let tmp = TempDir::new().unwrap();

    reqpin_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["compile", "--offline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requirements.in"));
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();

    reqpin_cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("why"));
}

#[test]
fn test_compile_names_constraint_files() {
    let tmp = sample_tree();
    fs::write(tmp.path().join("pins.txt"), "log<3\n").unwrap();

    reqpin_cmd(tmp.path())
        .current_dir(tmp.path())
        .args(["compile", "--offline", "--source", "src", "-c", "pins.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("log==2.5  # db (<3), pins.txt (<3), web\n"));
}
