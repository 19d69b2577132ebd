use anyhow::{Context, Result};
use log::debug;
use sha2::{Digest, Sha512};
use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

const BLOCK_SIZE: usize = 4096;

/// Returns the lowercase hex SHA-512 digest of the file at `path`.
pub(crate) fn sha512_for(path: &Path) -> Result<String> {
    debug!("computing the SHA-512 digest of {}", path.display());
    let file =
        File::open(path).with_context(|| format!("failed to open {} for hashing", path.display()))?;
    sha512_digest_for(file).with_context(|| format!("failed to read {}", path.display()))
}

pub(crate) fn sha512_digest_for(mut reader: impl Read) -> Result<String> {
    let mut hasher = Sha512::new();
    let mut block = [0u8; BLOCK_SIZE];
    loop {
        let n = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&block[..n]);
    }
    Ok(base16ct::lower::encode_string(&hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Reads at most a few bytes at a time so that blocks are never filled in one call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(7);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[rstest]
    #[case::empty(
        b"",
        "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
    )]
    #[case::abc(
        b"abc",
        "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
    )]
    fn known_digests(#[case] input: &[u8], #[case] expect: &str) -> Result<()> {
        assert_eq!(sha512_digest_for(input)?, expect);
        Ok(())
    }

    #[rstest]
    #[case::smaller_than_a_block(100)]
    #[case::exactly_one_block(BLOCK_SIZE)]
    #[case::several_blocks_and_a_bit(BLOCK_SIZE * 3 + 17)]
    fn matches_one_shot_digest(#[case] len: usize) -> Result<()> {
        let content = (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let expect = base16ct::lower::encode_string(&Sha512::digest(&content));

        assert_eq!(sha512_digest_for(content.as_slice())?, expect);
        assert_eq!(sha512_digest_for(Trickle(&content))?, expect);

        let mut file = NamedTempFile::new()?;
        file.write_all(&content)?;
        file.flush()?;
        let from_file = sha512_for(file.path())?;
        assert_eq!(from_file, expect);
        assert_eq!(sha512_for(file.path())?, from_file, "digest is reproducible");
        assert_eq!(from_file.len(), 128);

        Ok(())
    }

    #[test]
    fn missing_file() {
        let res = sha512_for(Path::new("/this/path/does/not/exist.zip"));
        assert!(res.is_err());
    }
}
