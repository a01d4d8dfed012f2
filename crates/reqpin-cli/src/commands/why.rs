//! Handler for `reqpin why`.

use std::path::Path;

use miette::Result;

use reqpin_ops::ops_why;
use reqpin_util::errors::ReqpinError;

pub fn exec(package: &str, solution: &Path) -> Result<()> {
    let cwd = std::env::current_dir().map_err(ReqpinError::Io)?;
    let tree = ops_why::why(&cwd, solution, package)?;
    print!("{tree}");
    Ok(())
}
