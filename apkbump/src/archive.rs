use crate::error::SyncError;
use anyhow::{Context, Result};
use log::debug;
use std::{fs::File, path::Path};
use zip::ZipArchive;

// A release asset that is not actually a zip archive (a proxy's HTML error page, a truncated
// download) would otherwise have its checksum written into the manifest.
pub(crate) fn check_zip(path: &Path) -> Result<usize> {
    debug!("checking that {} is a readable zip archive", path.display());

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let zip = ZipArchive::new(file).map_err(|e| SyncError::InvalidArchive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if zip.is_empty() {
        return Err(SyncError::InvalidArchive {
            path: path.to_path_buf(),
            reason: "the archive contains no entries".to_string(),
        }
        .into());
    }

    debug!("{} contains {} entries", path.display(), zip.len());
    Ok(zip.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::{write::SimpleFileOptions, ZipWriter};

    pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default())?;
            writer.write_all(content)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    #[test]
    fn valid_zip() -> Result<()> {
        let td = tempdir()?;
        let path = td.path().join("Northstar.release.v1.19.0.zip");
        std::fs::write(
            &path,
            zip_bytes(&[
                ("R2Northstar/mods/placeholder.txt", b"hello".as_slice()),
                ("NorthstarLauncher.exe", b"MZ".as_slice()),
            ])?,
        )?;
        assert_eq!(check_zip(&path)?, 2);
        Ok(())
    }

    #[test]
    fn not_a_zip() -> Result<()> {
        let td = tempdir()?;
        let path = td.path().join("Northstar.release.v1.19.0.zip");
        std::fs::write(&path, b"<html><body>502 Bad Gateway</body></html>")?;

        let err = check_zip(&path).expect_err("an HTML page is not a zip file");
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::InvalidArchive { .. }),
        ));
        Ok(())
    }

    #[test]
    fn empty_zip() -> Result<()> {
        let td = tempdir()?;
        let path = td.path().join("empty.zip");
        std::fs::write(&path, zip_bytes(&[])?)?;

        let err = check_zip(&path).expect_err("an empty archive is rejected");
        assert_eq!(
            err.downcast_ref::<SyncError>(),
            Some(&SyncError::InvalidArchive {
                path: path.clone(),
                reason: "the archive contains no entries".to_string(),
            }),
        );
        Ok(())
    }
}
