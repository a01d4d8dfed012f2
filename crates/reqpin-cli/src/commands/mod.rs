//! Command dispatch and handler modules.

mod compile;
mod why;

use miette::Result;

use reqpin_ops::ops_compile::CompileOptions;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Compile {
            inputs,
            constraints,
            solution,
            upgrade,
            sources,
            index_url,
            extra_index_urls,
            offline,
            pre,
            python_version,
            extras,
            output,
        } => compile::exec(CompileOptions {
            inputs,
            constraints,
            solution,
            upgrade,
            sources,
            index_url,
            extra_index_urls,
            offline,
            allow_prereleases: pre,
            python_version,
            extras,
            output,
        }),
        Command::Why { package, solution } => why::exec(&package, &solution),
    }
}
