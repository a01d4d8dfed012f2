//! Index-backed repository over the PyPI JSON API.
//!
//! `GET <index>/<name>/json` lists the releases of a project and
//! `GET <index>/<name>/<version>/json` carries the metadata of one release.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use reqpin_core::{normalize_name, DistInfo, PackageName, RepositoryId, Requirement, Version};

use crate::download::{build_client, fetch_json};
use crate::error::{RepositoryError, RepositoryInitializationError};
use crate::repository::{select_by_name, Candidate, DistributionType, Repository};

/// Response of `<index>/<name>/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectResponse {
    info: ReleaseInfo,
    #[serde(default)]
    releases: BTreeMap<String, Vec<ReleaseFile>>,
}

/// Response of `<index>/<name>/<version>/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseResponse {
    info: ReleaseInfo,
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReleaseInfo {
    name: String,
    version: String,
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReleaseFile {
    packagetype: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    yanked: bool,
}

impl ReleaseFile {
    fn is_wheel(&self) -> bool {
        self.packagetype == "bdist_wheel"
    }
}

/// Candidates for every release with at least one file that is not
/// yanked, highest version first. Releases with a wheel are prebuilt.
pub fn candidates_from_project(project: &ProjectResponse, origin: &RepositoryId) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (raw, files) in &project.releases {
        let available: Vec<&ReleaseFile> = files.iter().filter(|f| !f.yanked).collect();
        if available.is_empty() {
            continue;
        }
        let version = match Version::parse(raw) {
            Ok(version) => version,
            Err(e) => {
                tracing::debug!("skipping {} {raw}: {e}", project.info.name);
                continue;
            }
        };
        let wheel = available.iter().find(|f| f.is_wheel());
        let (kind, location) = match wheel {
            Some(file) => (DistributionType::Prebuilt, file.url.clone()),
            None => (DistributionType::Source, available[0].url.clone()),
        };
        candidates.push(Candidate::new(
            project.info.name.clone(),
            version,
            kind,
            location,
            origin.clone(),
        ));
    }
    candidates.sort_by(|a, b| b.version.cmp(&a.version));
    candidates
}

/// Metadata of one release. A null `requires_dist` on a release that only
/// ships source files means the index never saw the dependencies, so the
/// result is marked incomplete.
pub fn dist_from_release(
    release: &ReleaseResponse,
    origin: &RepositoryId,
) -> Result<(DistInfo, bool), RepositoryError> {
    let info = &release.info;
    let version = Version::parse(&info.version).map_err(|e| RepositoryError::Metadata {
        name: info.name.clone(),
        version: info.version.clone(),
        message: e.to_string(),
    })?;

    let requirements = info
        .requires_dist
        .iter()
        .flatten()
        .map(|text| {
            Requirement::parse(text).map_err(|source| RepositoryError::Requirement {
                name: info.name.clone(),
                text: text.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let source_only = !release.urls.iter().any(ReleaseFile::is_wheel);
    let complete = info.requires_dist.is_some() || !source_only;
    if !complete {
        tracing::debug!("{} {} has no published dependency metadata", info.name, info.version);
    }

    let dist = DistInfo::new(info.name.clone(), version, requirements).with_origin(origin.clone());
    Ok((dist, complete))
}

/// A PyPI-compatible JSON index.
pub struct PyPiRepository {
    index_url: String,
    identity: RepositoryId,
    client: Option<Client>,
    projects: HashMap<PackageName, Vec<Candidate>>,
    releases: HashMap<(PackageName, Version), (DistInfo, bool)>,
    prereleases: bool,
}

impl PyPiRepository {
    pub fn new(
        index_url: &str,
        timeout: Duration,
        allow_prereleases: bool,
    ) -> Result<Self, RepositoryInitializationError> {
        let index_url = index_url.trim_end_matches('/').to_string();
        Ok(Self {
            identity: RepositoryId::new("pypi", &index_url),
            client: Some(build_client(timeout)?),
            index_url,
            projects: HashMap::new(),
            releases: HashMap::new(),
            prereleases: allow_prereleases,
        })
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    fn client(&self) -> Result<&Client, RepositoryError> {
        self.client.as_ref().ok_or_else(|| RepositoryError::Closed {
            identity: self.identity.to_string(),
        })
    }

    fn project_candidates(&mut self, key: &PackageName) -> Result<&[Candidate], RepositoryError> {
        if !self.projects.contains_key(key) {
            let url = format!("{}/{}/json", self.index_url, key);
            tracing::debug!("fetching {url}");
            let candidates = match fetch_json::<ProjectResponse>(self.client()?, &url)? {
                Some(project) => candidates_from_project(&project, &self.identity),
                None => {
                    tracing::debug!("{key} is not on {}", self.index_url);
                    Vec::new()
                }
            };
            self.projects.insert(key.clone(), candidates);
        }
        Ok(self.projects.get(key).map(Vec::as_slice).unwrap_or_default())
    }
}

impl Repository for PyPiRepository {
    fn identity(&self) -> RepositoryId {
        self.identity.clone()
    }

    fn get_candidates(&mut self, req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError> {
        let Some(req) = req else {
            // An index cannot be enumerated; offer what has been seen so far.
            let mut seen: Vec<&PackageName> = self.projects.keys().collect();
            seen.sort();
            return Ok(seen
                .into_iter()
                .flat_map(|key| self.projects[key].iter().cloned())
                .collect());
        };
        let key = req.key();
        let candidates = self.project_candidates(&key)?;
        Ok(select_by_name(candidates, Some(req)))
    }

    fn resolve_candidate(&mut self, candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError> {
        let cache_key = (normalize_name(&candidate.name), candidate.version.clone());
        if let Some(cached) = self.releases.get(&cache_key) {
            return Ok(cached.clone());
        }

        let url = format!("{}/{}/{}/json", self.index_url, cache_key.0, candidate.version);
        tracing::debug!("fetching {url}");
        let release = fetch_json::<ReleaseResponse>(self.client()?, &url)?.ok_or_else(|| {
            RepositoryError::NotFound {
                identity: self.identity.to_string(),
                name: candidate.name.clone(),
                version: candidate.version.to_string(),
            }
        })?;
        let resolved = dist_from_release(&release, &self.identity)?;
        self.releases.insert(cache_key, resolved.clone());
        Ok(resolved)
    }

    fn close(&mut self) {
        tracing::debug!("closing {}", self.identity);
        self.client = None;
        self.projects.clear();
        self.releases.clear();
    }

    fn allows_prereleases(&self) -> bool {
        self.prereleases
    }
}
