//! The `builder` module contains the `SyncerBuilder` struct which is used to create a `Syncer`
//! instance.
use crate::{
    github::GitHub,
    manifest::Manifest,
    picker::{AssetPicker, PKGVER_VAR},
    syncer::Syncer,
};
use anyhow::{anyhow, Context, Result};
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use std::{
    env,
    path::{Path, PathBuf},
};
use url::Url;

/// The project that is synced when no project is set.
pub const DEFAULT_PROJECT: &str = "R2Northstar/Northstar";

/// The manifest that is rewritten when no manifest is set.
pub const DEFAULT_MANIFEST: &str = "src/northstar/APKBUILD";

/// The checksum file template used when none is set.
pub const DEFAULT_CHECKSUM_FILE: &str = "Northstar.release.v$pkgver.zip";

const GITHUB_BASE_URL: &str = "https://github.com";

/// `SyncerBuilder` is used to create a [`Syncer`] instance.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct SyncerBuilder<'a> {
    project: Option<&'a str>,
    tag: Option<&'a str>,
    api_base_url: Option<&'a str>,
    token: Option<&'a str>,
    manifest: Option<PathBuf>,
    checksum_file: Option<&'a str>,
    download_dir: Option<PathBuf>,
    skip_archive_check: bool,
}

impl<'a> SyncerBuilder<'a> {
    /// Returns a new empty `SyncerBuilder`.
    #[must_use]
    pub fn new() -> Self {
        SyncerBuilder::default()
    }

    /// Set the project whose releases are tracked. This can either be just the owner/name, like
    /// `R2Northstar/Northstar`, or a GitHub URL for any page in the project, like
    /// `https://github.com/R2Northstar/Northstar/releases`. Defaults to `R2Northstar/Northstar`.
    #[must_use]
    pub fn project(mut self, project: &'a str) -> Self {
        self.project = Some(project);
        self
    }

    /// Set the release tag to sync to. By default the most recent release is used.
    #[must_use]
    pub fn tag(mut self, tag: &'a str) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Set the base URL for the GitHub API. This is useful for testing or if you want to operate
    /// against GitHub Enterprise. This should be something like
    /// `https://github.my-corp.example.com/api/v3`.
    #[must_use]
    pub fn api_base_url(mut self, api_base_url: &'a str) -> Self {
        self.api_base_url = Some(api_base_url);
        self
    }

    /// Set a token to use for GitHub requests. If this is not set, then the `GITHUB_TOKEN` env var
    /// is used, if it is set.
    #[must_use]
    pub fn token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    /// Set the path of the `APKBUILD` to rewrite. Defaults to `src/northstar/APKBUILD`, relative
    /// to the current directory.
    #[must_use]
    pub fn manifest<P: AsRef<Path>>(mut self, manifest: P) -> Self {
        self.manifest = Some(manifest.as_ref().to_path_buf());
        self
    }

    /// Set the file name that the manifest's checksum line refers to, with the version written as
    /// `$pkgver`. Defaults to `Northstar.release.v$pkgver.zip`. With `$pkgver` expanded, this is
    /// also the asset name that is preferred when a release has more than one zip asset.
    #[must_use]
    pub fn checksum_file(mut self, checksum_file: &'a str) -> Self {
        self.checksum_file = Some(checksum_file);
        self
    }

    /// Set the directory the release asset is downloaded into. Defaults to the current
    /// directory.
    #[must_use]
    pub fn download_dir<P: AsRef<Path>>(mut self, download_dir: P) -> Self {
        self.download_dir = Some(download_dir.as_ref().to_path_buf());
        self
    }

    /// Call this to skip checking that the downloaded asset is a readable zip archive before its
    /// checksum is written to the manifest.
    #[must_use]
    pub fn skip_archive_check(mut self) -> Self {
        self.skip_archive_check = true;
        self
    }

    /// Builds a new [`Syncer`] instance and returns it.
    ///
    /// # Errors
    ///
    /// This returns an error if the project cannot be parsed as `owner/repo`, if the API base URL
    /// is not a valid URL, if the checksum file template does not contain `$pkgver`, if the
    /// current directory cannot be determined, or if the HTTP client cannot be created.
    pub fn build(self) -> Result<Syncer> {
        let project_name = parse_project_name(self.project.unwrap_or(DEFAULT_PROJECT))?;

        let checksum_file = self.checksum_file.unwrap_or(DEFAULT_CHECKSUM_FILE);
        if !checksum_file.contains(PKGVER_VAR) {
            return Err(anyhow!(
                "the checksum file template `{checksum_file}` does not contain {PKGVER_VAR}"
            ));
        }

        let github = GitHub::new(
            project_name,
            self.tag.map(String::from),
            self.api_base_url,
            self.token.map(String::from),
        )?;
        let manifest = Manifest::new(
            self.manifest
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST)),
            checksum_file.to_string(),
        )?;
        let download_dir = download_dir(self.download_dir)?;

        Ok(Syncer::new(
            github,
            AssetPicker::new(checksum_file.to_string()),
            manifest,
            download_dir,
            !self.skip_archive_check,
            reqwest_client()?,
        ))
    }
}

fn parse_project_name(project: &str) -> Result<String> {
    let parsed = if project.starts_with("http") {
        Url::parse(project)?
    } else {
        Url::parse(GITHUB_BASE_URL)?.join(project)?
    };

    let parts = parsed.path().split('/').collect::<Vec<_>>();
    if parts.len() < 3 || parts[1].is_empty() || parts[2].is_empty() {
        return Err(anyhow!("could not parse owner and repo name from {project}"));
    }

    // The first part is an empty string for the leading '/' in the path.
    let (owner, repo) = (parts[1], parts[2]);
    debug!("Parsed {project} = {owner} / {repo}");

    Ok(format!("{owner}/{repo}"))
}

fn download_dir(download_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = if let Some(dir) = download_dir {
        dir
    } else {
        env::current_dir().context("could not determine the current directory")?
    };
    debug!("download dir = {}", dir.display());
    Ok(dir)
}

fn reqwest_client() -> Result<Client> {
    let builder = Client::builder().gzip(true);

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("apkbump version {}", super::VERSION))?,
    );
    Ok(builder.default_headers(headers).build()?)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::owner_and_repo("R2Northstar/Northstar")]
    #[case::project_url("https://github.com/R2Northstar/Northstar")]
    #[case::releases_url("https://github.com/R2Northstar/Northstar/releases")]
    #[case::release_download_url(
        "https://github.com/R2Northstar/Northstar/releases/download/v1.19.0/Northstar.release.v1.19.0.zip"
    )]
    fn parse_project_name(#[case] project: &str) -> Result<()> {
        assert_eq!(super::parse_project_name(project)?, "R2Northstar/Northstar");
        Ok(())
    }

    #[rstest]
    #[case::owner_only("R2Northstar")]
    #[case::empty_repo("R2Northstar/")]
    #[case::host_only("https://github.com/")]
    fn parse_project_name_fails(#[case] project: &str) {
        assert!(super::parse_project_name(project).is_err());
    }

    #[test]
    fn build_with_defaults() -> Result<()> {
        let syncer = SyncerBuilder::new().token("token").build()?;
        let debug = format!("{syncer:?}");
        assert!(debug.contains("R2Northstar/Northstar"));
        assert!(debug.contains("src/northstar/APKBUILD"));
        Ok(())
    }

    #[test]
    fn checksum_file_needs_pkgver() {
        let res = SyncerBuilder::new()
            .token("token")
            .checksum_file("Northstar.release.zip")
            .build();
        assert!(res.is_err());
    }

    #[test]
    fn invalid_api_base_url() {
        let res = SyncerBuilder::new()
            .token("token")
            .api_base_url("not a url")
            .build();
        assert!(res.is_err());
    }
}
