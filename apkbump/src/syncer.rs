use crate::{
    archive, checksums, error::SyncError, github::GitHub, manifest::Manifest, picker::AssetPicker,
    release::Asset,
};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client, StatusCode,
};
use std::{
    fs::File,
    io::Write,
    path::{Component, Path, PathBuf},
};

/// `Syncer` is the core of this library, and is used to bring a manifest up to date with the
/// latest release. Use the [`SyncerBuilder`](crate::SyncerBuilder) struct to create a new
/// `Syncer` instance.
#[derive(Debug)]
pub struct Syncer {
    github: GitHub,
    asset_picker: AssetPicker,
    manifest: Manifest,
    download_dir: PathBuf,
    check_archive: bool,
    reqwest_client: Client,
}

/// What a successful [`Syncer::sync`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The release version, without a leading `v`.
    pub version: String,
    /// The name of the release asset that was downloaded.
    pub asset_name: String,
    /// Where the downloaded asset was saved.
    pub archive_path: PathBuf,
    /// The lowercase hex SHA-512 digest of the downloaded asset.
    pub digest: String,
    /// The manifest that was checked.
    pub manifest_path: PathBuf,
    /// Whether the manifest content changed. This is `false` when it already had this version and
    /// digest, or when it had no `pkgver=` field or checksum line to rewrite.
    pub manifest_updated: bool,
    /// How many `pkgver=X.Y.Z` fields were found in the manifest.
    pub version_fields: usize,
    /// How many checksum lines for the checksum file were found in the manifest.
    pub checksum_lines: usize,
}

impl SyncOutcome {
    /// Returns `true` if the manifest had neither a `pkgver=X.Y.Z` field nor a checksum line, so
    /// nothing in it could be synced.
    #[must_use]
    pub fn nothing_matched(&self) -> bool {
        self.version_fields == 0 && self.checksum_lines == 0
    }
}

impl Syncer {
    pub(crate) fn new(
        github: GitHub,
        asset_picker: AssetPicker,
        manifest: Manifest,
        download_dir: PathBuf,
        check_archive: bool,
        reqwest_client: Client,
    ) -> Syncer {
        Syncer {
            github,
            asset_picker,
            manifest,
            download_dir,
            check_archive,
            reqwest_client,
        }
    }

    /// Sync the manifest with the latest release. This looks up the release, downloads its zip
    /// asset into the download directory, computes the asset's SHA-512 digest, and rewrites the
    /// manifest's `pkgver=` field and checksum line.
    ///
    /// # Errors
    ///
    /// There are a number of cases where an error can be returned:
    ///
    /// * Network errors on requests to GitHub, including non-success HTTP statuses.
    /// * The release info is not valid JSON or lacks `tag_name` or `assets`.
    /// * The release tag is not a version of the form `X.Y.Z` ([`SyncError::InvalidVersion`]).
    /// * No asset has `zip` in its name ([`SyncError::NoMatchingAsset`]).
    /// * The picked asset's name does not contain the version ([`SyncError::VersionMismatch`]).
    /// * The asset name is not a plain file name ([`SyncError::UnsafeAssetName`]).
    /// * The download is not a readable zip archive ([`SyncError::InvalidArchive`]).
    /// * The download or the manifest cannot be read or written.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let release = self.github.fetch_release(&self.reqwest_client).await?;
        let version = release.version()?;
        info!("newest version is {version}");

        let asset = self.asset_picker.pick_asset(release.assets, &version)?;
        let asset_name = asset.name.clone();
        let archive_path = self.download_asset(asset).await?;

        if self.check_archive {
            archive::check_zip(&archive_path)?;
        } else {
            debug!("skipping the zip archive check");
        }

        let digest = checksums::sha512_for(&archive_path)?;
        info!("SHA-512 digest of {asset_name} is {digest}");

        let update = self.manifest.update(&version, &digest)?;

        Ok(SyncOutcome {
            version,
            asset_name,
            archive_path,
            digest,
            manifest_path: self.manifest.path().to_path_buf(),
            manifest_updated: update.updated,
            version_fields: update.version_fields,
            checksum_lines: update.checksum_lines,
        })
    }

    async fn download_asset(&self, asset: Asset) -> Result<PathBuf> {
        let archive_path = download_path(&self.download_dir, &asset.name)?;
        debug!("downloading asset from {}", asset.url);

        let mut req_builder = self.reqwest_client.get(asset.url.clone()).header(
            ACCEPT,
            HeaderValue::from_str("application/octet-stream")
                .context("failed to create header value for Accept header")?,
        );
        req_builder = self.github.maybe_add_token_header(req_builder)?;
        let req = req_builder
            .build()
            .with_context(|| format!("failed to build HTTP request for {}", asset.url))?;

        let mut resp = self.reqwest_client.execute(req).await.with_context(|| {
            format!(
                "failed to execute HTTP request to download asset from {}",
                asset.url
            )
        })?;
        if resp.status() != StatusCode::OK {
            let mut msg = format!("error requesting {}: {}", asset.url, resp.status());
            if let Ok(t) = resp.text().await {
                msg.push('\n');
                msg.push_str(&t);
            }
            return Err(anyhow!(msg));
        }

        debug!("archive path is {}", archive_path.display());
        {
            let mut downloaded_file = File::create(&archive_path).with_context(|| {
                format!(
                    "failed to create file at {} for downloaded asset",
                    archive_path.display()
                )
            })?;
            while let Some(c) = resp.chunk().await.with_context(|| {
                format!(
                    "failed to read chunk while downloading asset from {}",
                    asset.url
                )
            })? {
                downloaded_file.write_all(c.as_ref()).with_context(|| {
                    format!("failed to write chunk to {}", archive_path.display())
                })?;
            }
            downloaded_file
                .flush()
                .with_context(|| format!("failed to flush {}", archive_path.display()))?;
        }

        info!("downloaded {} to {}", asset.name, archive_path.display());
        Ok(archive_path)
    }
}

// The asset name comes from the network, so it has to be a single normal path component before we
// join it onto the download directory.
fn download_path(download_dir: &Path, name: &str) -> Result<PathBuf, SyncError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(n)), None) if n == name => Ok(download_dir.join(name)),
        _ => Err(SyncError::UnsafeAssetName {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("Northstar.release.v1.19.0.zip", true)]
    #[case::empty("", false)]
    #[case::dot(".", false)]
    #[case::dot_dot("..", false)]
    #[case::parent_traversal("../Northstar.release.v1.19.0.zip", false)]
    #[case::subdirectory("dir/Northstar.release.v1.19.0.zip", false)]
    #[case::absolute("/etc/Northstar.release.v1.19.0.zip", false)]
    #[case::trailing_slash("Northstar.release.v1.19.0.zip/", false)]
    fn download_path_is_checked(#[case] name: &str, #[case] ok: bool) {
        let dir = Path::new("downloads");
        let res = download_path(dir, name);
        if ok {
            assert_eq!(res, Ok(dir.join(name)));
        } else {
            assert_eq!(
                res,
                Err(SyncError::UnsafeAssetName {
                    name: name.to_string()
                }),
            );
        }
    }
}
