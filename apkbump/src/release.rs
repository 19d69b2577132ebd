use crate::error::SyncError;
use anyhow::{anyhow, Result};
use lazy_regex::regex_is_match;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub(crate) struct Release {
    pub(crate) tag_name: String,
    pub(crate) assets: Vec<Asset>,
}

impl Release {
    // GitHub tags look like `v1.19.0`. The manifest only understands plain `X.Y.Z`, so anything
    // else is rejected here instead of being written into `pkgver=` where the next run could not
    // match it.
    pub(crate) fn version(&self) -> Result<String, SyncError> {
        let version = self
            .tag_name
            .strip_prefix('v')
            .unwrap_or(self.tag_name.as_str());
        if !regex_is_match!(r"^[0-9]+\.[0-9]+\.[0-9]+$", version) {
            return Err(SyncError::InvalidVersion {
                tag: self.tag_name.clone(),
            });
        }
        Ok(version.to_string())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(try_from = "AssetHelper")]
pub(crate) struct Asset {
    pub(crate) name: String,
    pub(crate) url: Url,
}

#[derive(Debug, Deserialize)]
struct AssetHelper {
    name: String,
    url: Option<Url>,
    browser_download_url: Option<Url>,
}

impl TryFrom<AssetHelper> for Asset {
    type Error = anyhow::Error;

    fn try_from(helper: AssetHelper) -> Result<Self, Self::Error> {
        // The browser URL serves the file directly. The API `url` only does that when asked for
        // `application/octet-stream`, which we do, so it is a usable fallback.
        let url = helper.browser_download_url.or(helper.url).ok_or(anyhow!(
            "the asset `{}` in the response did not have a `browser_download_url` or `url` field",
            helper.name,
        ))?;

        Ok(Asset {
            name: helper.name,
            url,
        })
    }
}
