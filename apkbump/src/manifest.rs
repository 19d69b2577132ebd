use anyhow::{Context, Result};
use lazy_regex::regex;
use log::{debug, info, warn};
use regex::{NoExpand, Regex};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

#[derive(Debug)]
pub(crate) struct Manifest {
    path: PathBuf,
    checksum_file: String,
    checksum_line_re: Regex,
}

/// The result of substituting a new version and digest into manifest text.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Rewrite {
    pub(crate) content: String,
    pub(crate) version_fields: usize,
    pub(crate) checksum_lines: usize,
}

/// What [`Manifest::update`] found and did.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ManifestUpdate {
    pub(crate) updated: bool,
    pub(crate) version_fields: usize,
    pub(crate) checksum_lines: usize,
}

impl Manifest {
    pub(crate) fn new(path: PathBuf, checksum_file: String) -> Result<Self> {
        let checksum_line_re = Regex::new(&format!(
            "[0-9a-fA-F]+  {}",
            regex::escape(&checksum_file)
        ))
        .with_context(|| format!("could not build a checksum line regex for `{checksum_file}`"))?;

        Ok(Manifest {
            path,
            checksum_file,
            checksum_line_re,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the manifest on disk. The returned `updated` is `false` if the manifest already had
    /// this version and digest, or had nothing to substitute, in which case the file is not touched.
    pub(crate) fn update(&self, version: &str, digest: &str) -> Result<ManifestUpdate> {
        debug!("reading manifest at {}", self.path.display());
        let original = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read the manifest at {}", self.path.display()))?;

        let rewrite = self.rewrite(&original, version, digest);
        if rewrite.version_fields == 0 {
            warn!(
                "found no `pkgver=X.Y.Z` field in {}, the version was not updated",
                self.path.display(),
            );
        }
        if rewrite.checksum_lines == 0 {
            warn!(
                "found no checksum line for `{}` in {}, the checksum was not updated",
                self.checksum_file,
                self.path.display(),
            );
        }

        let mut update = ManifestUpdate {
            updated: false,
            version_fields: rewrite.version_fields,
            checksum_lines: rewrite.checksum_lines,
        };
        if rewrite.content == original {
            info!("{} is already up to date", self.path.display());
            return Ok(update);
        }

        write_atomically(&self.path, &rewrite.content)?;
        info!(
            "updated {} version field(s) and {} checksum line(s) in {}",
            rewrite.version_fields,
            rewrite.checksum_lines,
            self.path.display(),
        );
        update.updated = true;
        Ok(update)
    }

    pub(crate) fn rewrite(&self, content: &str, version: &str, digest: &str) -> Rewrite {
        let pkgver_re = regex!(r"pkgver=[0-9]+\.[0-9]+\.[0-9]+");
        let version_fields = pkgver_re.find_iter(content).count();
        // The replacements must not be expanded, since `$pkgver` would be read as a reference to a
        // capture group named `pkgver`.
        let content =
            pkgver_re.replace_all(content, NoExpand(&format!("pkgver={version}")));

        let checksum_lines = self.checksum_line_re.find_iter(&content).count();
        let content = self
            .checksum_line_re
            .replace_all(
                &content,
                NoExpand(&format!("{digest}  {}", self.checksum_file)),
            )
            .into_owned();

        Rewrite {
            content,
            version_fields,
            checksum_lines,
        }
    }
}

// Writes to a temp file in the same directory and renames it over the target, so the target is
// either the old content or the new content, never a mix.
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write to {}", tmp.path().display()))?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(permissions)?;

    debug!(
        "renaming {} to {}",
        tmp.path().display(),
        path.display()
    );
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}
