//! Handler for `reqpin compile`.

use std::io::Write;

use miette::Result;

use reqpin_ops::ops_compile::{self, CompileOptions};
use reqpin_util::errors::ReqpinError;

pub fn exec(opts: CompileOptions) -> Result<()> {
    let cwd = std::env::current_dir().map_err(ReqpinError::Io)?;
    let outcome = ops_compile::compile(&cwd, &opts)?;

    if opts.output.is_none() {
        std::io::stdout()
            .write_all(outcome.solution.as_bytes())
            .map_err(ReqpinError::Io)?;
    }
    Ok(())
}
