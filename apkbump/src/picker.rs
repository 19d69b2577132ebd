use crate::{error::SyncError, release::Asset};
use anyhow::Result;
use itertools::Itertools;
use log::{debug, info, warn};

/// The variable APKBUILD files use for the package version. The checksum file template contains it
/// unexpanded.
pub(crate) const PKGVER_VAR: &str = "$pkgver";

#[derive(Debug)]
pub(crate) struct AssetPicker {
    checksum_file: String,
}

impl AssetPicker {
    pub(crate) fn new(checksum_file: String) -> Self {
        Self { checksum_file }
    }

    /// The asset name we expect for the given version, e.g. `Northstar.release.v1.19.0.zip`.
    pub(crate) fn expected_name(&self, version: &str) -> String {
        self.checksum_file.replace(PKGVER_VAR, version)
    }

    pub(crate) fn pick_asset(&self, assets: Vec<Asset>, version: &str) -> Result<Asset> {
        let all_names = assets.iter().map(|a| a.name.as_str()).join(", ");

        debug!("filtering out asset names that do not contain `zip`");
        let mut candidates = assets
            .into_iter()
            .filter(|a| {
                if a.name.contains("zip") {
                    true
                } else {
                    debug!("skipping asset `{}`", a.name);
                    false
                }
            })
            .collect::<Vec<_>>();

        if candidates.is_empty() {
            return Err(SyncError::NoMatchingAsset { names: all_names }.into());
        }

        let expected = self.expected_name(version);
        let picked = if let Some(pos) = candidates.iter().position(|a| a.name == expected) {
            debug!("found an asset named exactly `{expected}`");
            candidates.swap_remove(pos)
        } else {
            if candidates.len() > 1 {
                warn!(
                    "no asset is named `{expected}` and there are {} zip assets, using the first one listed: [{}]",
                    candidates.len(),
                    candidates.iter().map(|a| a.name.as_str()).join(", "),
                );
            }
            candidates.remove(0)
        };

        if !picked.name.contains(version) {
            return Err(SyncError::VersionMismatch {
                version: version.to_string(),
                asset: picked.name,
            }
            .into());
        }

        info!("picked asset named {}", picked.name);
        Ok(picked)
    }
}
