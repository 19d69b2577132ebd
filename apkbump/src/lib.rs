//! A library for keeping an Alpine `APKBUILD` in sync with a project's GitHub releases.
//!
//! `apkbump` looks up the newest release of a project on GitHub, downloads the release's zip
//! archive, computes its SHA-512 digest, and rewrites the `pkgver=` field and the matching
//! `sha512sums` line of an `APKBUILD` file. It was written for the Northstar package, and its
//! defaults point there, but every target can be overridden.
//!
//! This project also ships a CLI tool named `apkbump`.
//!
//! The main entry point for programmatic use is the [`SyncerBuilder`] struct. Here is an example
//! of its usage:
//!
//! ```ignore
//! use apkbump::SyncerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let syncer = SyncerBuilder::new()
//!         .project("R2Northstar/Northstar")
//!         .manifest("src/northstar/APKBUILD")
//!         .build()?;
//!
//!     let outcome = syncer.sync().await?;
//!     println!("now at {}", outcome.version);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## What Gets Rewritten
//!
//! Two regions of the manifest are touched, and nothing else:
//!
//! - Every `pkgver=X.Y.Z` assignment becomes `pkgver=<new version>`.
//! - Every line of the form `<hex digest>  Northstar.release.v$pkgver.zip` gets the new digest.
//!   The file name part is the "checksum file template", and it is matched literally, including
//!   the unexpanded `$pkgver`.
//!
//! The new content is written to a temporary file next to the manifest and then renamed over it,
//! so an interrupted run never leaves a half-written manifest behind.
//!
//! ## How the Release Asset Is Picked
//!
//! Only assets with `zip` in their name are considered. If one of them is named exactly like the
//! checksum file template with `$pkgver` expanded, that one wins. Otherwise the first one in the
//! order GitHub lists them is used. The release's version (its tag without a leading `v`) must
//! appear in the picked asset's name, or the sync fails with [`SyncError::VersionMismatch`].
//!
//! ## Features
//!
//! This crate offers several features to control the TLS dependency used by `reqwest`:
//!
#![doc = document_features::document_features!()]

mod archive;
mod builder;
mod checksums;
mod error;
mod github;
mod manifest;
mod picker;
mod release;
mod syncer;

pub use crate::{
    builder::{SyncerBuilder, DEFAULT_CHECKSUM_FILE, DEFAULT_MANIFEST, DEFAULT_PROJECT},
    error::SyncError,
    syncer::{SyncOutcome, Syncer},
};

// The version of the `apkbump` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "logging")]
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};

/// This function initializes logging for the application. It's public for the sake of the
/// `apkbump` binary, but it lives in the library crate so that test code can also enable logging.
///
/// # Errors
///
/// This can return a `log::SetLoggerError` error.
#[cfg(feature = "logging")]
pub fn init_logger(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    let line_colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::BrightBlack)
        .debug(Color::BrightBlack)
        .trace(Color::BrightBlack);
    let level_colors = line_colors.info(Color::Green).debug(Color::Black);

    Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{color_line}[{target}][{level}{color_line}] {message}\x1B[0m",
                color_line = format_args!(
                    "\x1B[{}m",
                    line_colors.get_color(&record.level()).to_fg_str()
                ),
                target = record.target(),
                level = level_colors.color(record.level()),
                message = message,
            ));
        })
        .level(level)
        // This is very noisy.
        .level_for("hyper", log::LevelFilter::Error)
        .level_for("hyper_util", log::LevelFilter::Error)
        .chain(std::io::stderr())
        .apply()
}
