//! Operation: explain why a package is in a solution.

use std::path::Path;

use reqpin_repos::{Repository, SolutionRepository};
use reqpin_util::errors::ReqpinError;

/// Reverse-dependency tree of `package` as recorded in the solution file
/// at `solution`.
pub fn why(cwd: &Path, solution: &Path, package: &str) -> miette::Result<String> {
    let path = cwd.join(solution);
    let mut repo = SolutionRepository::load(&path, &[])?;
    let tree = repo.graph().print_inverted_tree(package);
    repo.close();
    if tree.is_empty() {
        return Err(ReqpinError::Generic {
            message: format!("{package} is not part of {}", solution.display()),
        }
        .into());
    }
    Ok(tree)
}
