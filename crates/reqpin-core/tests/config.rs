use std::fs;

use reqpin_core::config::{dirs_path, Config};
use tempfile::TempDir;

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.index.url, "https://pypi.org/pypi");
    assert_eq!(config.resolve.max_invalidations, 3);
    assert!(!config.resolve.allow_prereleases);
    assert_eq!(config.environment.python_version, "3.12");
    assert!(config.extract.command.is_empty());
}

#[test]
fn test_config_defaults_from_empty_toml() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.index.timeout, 30);
    assert_eq!(config.resolve.max_invalidations, 3);
}

#[test]
fn test_dirs_path_contains_reqpin() {
    assert!(dirs_path().ends_with(".reqpin"));
}

#[test]
fn test_project_overrides_global_per_key() {
    let global = r#"
[index]
url = "https://mirror.example.com/pypi"
timeout = 10

[environment]
python-version = "3.8"
"#;
    let project = r#"
[index]
timeout = 60

[resolve]
allow-prereleases = true
exclude = ["**/tests/**"]

[environment.markers]
sys_platform = "win32"
"#;
    let config = Config::from_layers(Some(global), Some(project)).unwrap();
    assert_eq!(config.index.url, "https://mirror.example.com/pypi");
    assert_eq!(config.index.timeout, 60);
    assert!(config.resolve.allow_prereleases);
    assert_eq!(config.resolve.exclude, vec!["**/tests/**"]);

    let env = config.marker_environment();
    assert_eq!(env.get("python_version"), Some("3.8"));
    assert_eq!(env.get("sys_platform"), Some("win32"));
}

#[test]
fn test_invalid_config_is_an_error() {
    assert!(Config::from_layers(Some("[index\nurl ="), None).is_err());
    assert!(Config::from_layers(None, Some("[resolve]\nmax-invalidations = \"many\"")).is_err());
}

#[test]
fn test_load_finds_project_file_in_ancestor() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("reqpin.toml"),
        "[extract]\ncommand = [\"python\", \"extract.py\"]\n",
    )
    .unwrap();
    let nested = tmp.path().join("src/pkg");
    fs::create_dir_all(&nested).unwrap();
    let config = Config::load(&nested).unwrap();
    assert_eq!(config.extract.command, vec!["python", "extract.py"]);
}
