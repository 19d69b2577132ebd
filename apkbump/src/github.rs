use crate::release::Release;
use anyhow::{anyhow, Context, Result};
use log::debug;
use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION},
    Client, RequestBuilder,
};
use std::env;
use url::Url;

pub(crate) const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

pub(crate) const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

#[derive(Debug)]
pub(crate) struct GitHub {
    project_name: String,
    tag: Option<String>,
    api_base_url: Url,
    token: Option<String>,
}

impl GitHub {
    pub(crate) fn new(
        project_name: String,
        tag: Option<String>,
        api_base_url: Option<&str>,
        mut token: Option<String>,
    ) -> Result<Self> {
        let api_base_url = Url::parse(api_base_url.unwrap_or(DEFAULT_API_BASE_URL))
            .context("the API base URL is not a valid URL")?;

        if token.is_none() {
            token = env::var(TOKEN_ENV_VAR).ok();
            if token.is_some() {
                debug!("Using GitHub token from the {TOKEN_ENV_VAR} environment variable.");
            }
        }

        Ok(GitHub {
            project_name,
            tag,
            api_base_url,
            token,
        })
    }

    pub(crate) async fn fetch_release(&self, client: &Client) -> Result<Release> {
        debug!("Fetching release info for project `{}`", self.project_name);

        let url = self.release_info_url()?;
        debug!("Getting release info from `{url}`");

        let mut req_builder = client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_str("application/json")?);
        req_builder = self.maybe_add_token_header(req_builder)?;
        let resp = client
            .execute(req_builder.build()?)
            .await
            .with_context(|| format!("failed to request release info from {url}"))?;

        if let Err(e) = resp.error_for_status_ref() {
            return Err(anyhow::Error::new(e));
        }

        resp.json::<Release>()
            .await
            .with_context(|| format!("could not parse the release info returned by {url}"))
    }

    fn release_info_url(&self) -> Result<Url> {
        let (owner, repo) = self.project_name.split_once('/').ok_or_else(|| {
            anyhow!(
                "the project name `{}` is not of the form owner/repo",
                self.project_name
            )
        })?;

        let mut url = self.api_base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow!("cannot use {} as a base URL", self.api_base_url))?;
            segments
                .pop_if_empty()
                .extend(["repos", owner, repo, "releases"]);
            if let Some(tag) = &self.tag {
                segments.extend(["tags", tag.as_str()]);
            } else {
                segments.push("latest");
            }
        }

        Ok(url)
    }

    pub(crate) fn maybe_add_token_header(
        &self,
        mut req_builder: RequestBuilder,
    ) -> Result<RequestBuilder> {
        if let Some(token) = self.token.as_deref() {
            debug!("Adding token to GitHub request.");
            let bearer = format!("Bearer {token}");
            let mut auth_val = HeaderValue::from_str(&bearer)?;
            auth_val.set_sensitive(true);
            req_builder = req_builder.header(AUTHORIZATION, auth_val);
        } else {
            debug!("No token given.");
        }
        Ok(req_builder)
    }
}
