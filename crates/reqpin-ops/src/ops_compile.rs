//! Operation: resolve requirements files into a solution.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqpin_core::config::Config;
use reqpin_core::reqfile::RequirementsFile;
use reqpin_core::DistInfo;
use reqpin_repos::{
    CommandExtractor, MetadataExtractor, MultiRepository, PyPiRepository, SolutionRepository,
    SourceRepository,
};
use reqpin_resolver::{ConstraintSet, Resolver, ResolverOptions};
use reqpin_util::errors::ReqpinError;
use reqpin_util::progress;

/// Default input when no requirements file is named.
pub const DEFAULT_INPUT: &str = "requirements.in";

/// Options for `reqpin compile`. Unset values fall back to configuration.
#[derive(Debug, Default, Clone)]
pub struct CompileOptions {
    /// Requirements files; `-` reads standard input.
    pub inputs: Vec<PathBuf>,
    /// Files whose requirements only constrain versions.
    pub constraints: Vec<PathBuf>,
    /// A previous solution whose pins are reused where they still fit.
    pub solution: Option<PathBuf>,
    /// Packages to resolve again instead of taking them from `solution`.
    pub upgrade: Vec<String>,
    /// Source trees searched before the index.
    pub sources: Vec<PathBuf>,
    pub index_url: Option<String>,
    pub extra_index_urls: Vec<String>,
    /// Do not contact any index.
    pub offline: bool,
    pub allow_prereleases: bool,
    pub python_version: Option<String>,
    /// Extras requested for every project found in a source tree.
    pub extras: Vec<String>,
    /// Write the solution here as well as returning it.
    pub output: Option<PathBuf>,
}

/// Result of a successful compile.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub solution: String,
    pub packages: usize,
}

/// Resolve the inputs named in `opts` against the configured repositories.
pub fn compile(cwd: &Path, opts: &CompileOptions) -> miette::Result<CompileOutcome> {
    let mut config = Config::load(cwd)?;
    apply_overrides(&mut config, opts);

    let (roots, mut constraints) = read_inputs(cwd, opts)?;
    for path in &opts.constraints {
        let file = RequirementsFile::load(&cwd.join(path))?;
        let mut requirements = file.requirements;
        requirements.extend(file.constraints);
        constraints.push(ConstraintSet::new(path.display().to_string(), requirements));
    }
    tracing::debug!("{} root(s), {} constraint file(s)", roots.len(), constraints.len());

    let repos = build_repositories(cwd, &config, opts)?;
    let options = ResolverOptions {
        max_invalidations: config.resolve.max_invalidations,
        allow_prereleases: config.resolve.allow_prereleases,
        constraints,
        environment: config.marker_environment(),
        source_extras: opts.extras.clone(),
    };

    let spinner = progress::spinner("Resolving requirements...");
    let mut resolver = Resolver::new(repos, options);
    let result = resolver.resolve(roots);
    spinner.finish_and_clear();
    resolver.finish();
    let resolution = result?;

    let solution = resolution.to_solution();
    let packages = resolution.pinned().len();
    if let Some(output) = &opts.output {
        let path = cwd.join(output);
        std::fs::write(&path, &solution).map_err(ReqpinError::Io)?;
        progress::status("Wrote", &path.display().to_string());
    }
    progress::status("Resolved", &format!("{packages} packages"));

    Ok(CompileOutcome { solution, packages })
}

fn apply_overrides(config: &mut Config, opts: &CompileOptions) {
    if let Some(url) = &opts.index_url {
        config.index.url = url.clone();
    }
    config.index.extra_urls.extend(opts.extra_index_urls.iter().cloned());
    config.index.offline |= opts.offline;
    config.resolve.allow_prereleases |= opts.allow_prereleases;
    config.resolve.sources.extend(opts.sources.iter().cloned());
    if let Some(version) = &opts.python_version {
        config.environment.python_version = version.clone();
    }
}

/// One synthetic root per input file, plus the constraints those files
/// pulled in with `-c`, named after the file that pulled them in.
fn read_inputs(cwd: &Path, opts: &CompileOptions) -> miette::Result<(Vec<DistInfo>, Vec<ConstraintSet>)> {
    let inputs = if opts.inputs.is_empty() {
        let default = PathBuf::from(DEFAULT_INPUT);
        if !cwd.join(&default).is_file() {
            return Err(ReqpinError::Requirements {
                message: format!("no input files given and no {DEFAULT_INPUT} in {}", cwd.display()),
            }
            .into());
        }
        vec![default]
    } else {
        opts.inputs.clone()
    };

    let mut roots = Vec::new();
    let mut constraints = Vec::new();
    for input in inputs {
        let file = if input == Path::new("-") {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(ReqpinError::Io)?;
            RequirementsFile::parse(&text, &cwd.join("-"))?
        } else {
            RequirementsFile::load(&cwd.join(&input))?
        };
        let name = input.display().to_string();
        if !file.constraints.is_empty() {
            constraints.push(ConstraintSet::new(name.clone(), file.constraints));
        }
        roots.push(DistInfo::root(name, file.requirements));
    }
    Ok((roots, constraints))
}

/// Repositories in priority order: the previous solution, source trees,
/// then the index and any extra indexes.
fn build_repositories(cwd: &Path, config: &Config, opts: &CompileOptions) -> miette::Result<MultiRepository> {
    let mut repos = MultiRepository::new();

    if let Some(path) = &opts.solution {
        let path = cwd.join(path);
        if path.is_file() {
            match SolutionRepository::load(&path, &opts.upgrade) {
                Ok(repo) => repos.add(Box::new(repo))?,
                Err(e) => {
                    tracing::debug!("{e:?}");
                    progress::status_warn("Ignoring", &format!("{}: {e}", path.display()));
                }
            }
        } else {
            tracing::debug!("no previous solution at {}", path.display());
        }
    }

    let extractor = CommandExtractor::new(&config.extract.command);
    for source in &config.resolve.sources {
        let repo = SourceRepository::new(
            &cwd.join(source),
            &config.resolve.exclude,
            extractor.as_ref().map(|e| e as &dyn MetadataExtractor),
        )?;
        repos.add(Box::new(repo))?;
    }

    if !config.index.offline {
        let timeout = Duration::from_secs(config.index.timeout);
        let prereleases = config.resolve.allow_prereleases;
        for url in std::iter::once(&config.index.url).chain(&config.index.extra_urls) {
            repos.add(Box::new(PyPiRepository::new(url, timeout, prereleases)?))?;
        }
    }

    if repos.is_empty() {
        return Err(ReqpinError::Repository {
            message: "no repositories to resolve from (offline without sources or a solution)".to_string(),
        }
        .into());
    }
    Ok(repos)
}
