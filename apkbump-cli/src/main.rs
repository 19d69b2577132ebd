use anyhow::{Error, Result};
use apkbump::{
    SyncOutcome, Syncer, SyncerBuilder, DEFAULT_CHECKSUM_FILE, DEFAULT_MANIFEST, DEFAULT_PROJECT,
};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
enum ApkbumpError {
    #[error("{0:}")]
    InvalidArgsError(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cmd = cmd();
    let matches = cmd.get_matches();
    let res = init_logger_from_matches(&matches);
    if let Err(e) = res {
        eprintln!("Error creating logger: {e}");
        std::process::exit(126);
    }

    let status = match make_syncer(&matches) {
        Ok(syncer) => match syncer.sync().await {
            Ok(outcome) => {
                print_outcome(&outcome);
                0
            }
            Err(e) => {
                print_err(&e);
                1
            }
        },
        Err(e) => {
            print_err(&e);
            127
        }
    };
    std::process::exit(status);
}

const MAX_TERM_WIDTH: usize = 100;

fn cmd() -> Command {
    Command::new("apkbump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Update an APKBUILD's pkgver and checksum to match the latest GitHub release")
        .arg(
            Arg::new("project")
                .long("project")
                .short('p')
                .default_value(DEFAULT_PROJECT)
                .help(concat!(
                    "The GitHub project whose releases are tracked, like R2Northstar/Northstar",
                    " or https://github.com/R2Northstar/Northstar.",
                )),
        )
        .arg(
            Arg::new("tag")
                .long("tag")
                .short('t')
                .help("The release tag to sync to. Defaults to the latest release."),
        )
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .short('m')
                .default_value(DEFAULT_MANIFEST)
                .help("The APKBUILD file to rewrite."),
        )
        .arg(
            Arg::new("checksum-file")
                .long("checksum-file")
                .default_value(DEFAULT_CHECKSUM_FILE)
                .help(concat!(
                    "The file name that the APKBUILD's checksum line refers to, with the version",
                    " written as $pkgver. With $pkgver expanded, this is also the asset name that",
                    " is preferred when a release has more than one zip asset.",
                )),
        )
        .arg(
            Arg::new("download-dir")
                .long("download-dir")
                .short('o')
                .help("The directory to save the release asset in. Defaults to the current directory."),
        )
        .arg(
            Arg::new("skip-archive-check")
                .long("skip-archive-check")
                .action(ArgAction::SetTrue)
                .help(concat!(
                    "Do not check that the downloaded asset is a readable zip archive before",
                    " writing its checksum.",
                )),
        )
        .arg(Arg::new("api-base-url").long("api-base-url").help(concat!(
            "The base URL for the GitHub API. This is useful for testing or if you want",
            " to operate against GitHub Enterprise. This should be something like",
            " `https://github.my-corp.example.com/api/v3`. A token is read from the GITHUB_TOKEN",
            " environment variable if it is set.",
        )))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output."),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debugging output."),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppresses most output."),
        )
        .group(ArgGroup::new("log-level").args(["verbose", "debug", "quiet"]))
        .max_term_width(MAX_TERM_WIDTH)
}

pub(crate) fn init_logger_from_matches(matches: &ArgMatches) -> Result<(), log::SetLoggerError> {
    let level = if matches.get_flag("debug") {
        log::LevelFilter::Debug
    } else if matches.get_flag("verbose") {
        log::LevelFilter::Info
    } else if matches.get_flag("quiet") {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Warn
    };

    apkbump::init_logger(level)
}

fn make_syncer(matches: &ArgMatches) -> Result<Syncer> {
    validate_args(matches)?;

    let mut builder = SyncerBuilder::new();
    if let Some(p) = matches.get_one::<String>("project") {
        builder = builder.project(p);
    }
    if let Some(t) = matches.get_one::<String>("tag") {
        builder = builder.tag(t);
    }
    if let Some(m) = matches.get_one::<String>("manifest") {
        builder = builder.manifest(m);
    }
    if let Some(c) = matches.get_one::<String>("checksum-file") {
        builder = builder.checksum_file(c);
    }
    if let Some(dir) = matches.get_one::<String>("download-dir") {
        builder = builder.download_dir(dir);
    }
    if matches.get_flag("skip-archive-check") {
        builder = builder.skip_archive_check();
    }
    if let Some(url) = matches.get_one::<String>("api-base-url") {
        builder = builder.api_base_url(url);
    }

    builder.build()
}

fn validate_args(matches: &ArgMatches) -> Result<()> {
    if let Some(c) = matches.get_one::<String>("checksum-file") {
        if !c.contains("$pkgver") {
            return Err(ApkbumpError::InvalidArgsError(format!(
                "The --checksum-file value must contain $pkgver, got `{c}`"
            ))
            .into());
        }
    }

    if let Some(m) = matches.get_one::<String>("manifest") {
        if m.is_empty() {
            return Err(ApkbumpError::InvalidArgsError(
                "The --manifest value cannot be empty".to_string(),
            )
            .into());
        }
    }

    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    println!("{}", outcome_message(outcome));
}

fn outcome_message(outcome: &SyncOutcome) -> String {
    let path = outcome.manifest_path.display();
    if outcome.manifest_updated {
        format!(
            "Updated {path} to version {} (sha512 {})",
            outcome.version, outcome.digest,
        )
    } else if outcome.nothing_matched() {
        format!(
            "{path} has no pkgver=X.Y.Z field or checksum line, so it was not updated to version {}",
            outcome.version,
        )
    } else {
        format!("{path} is already at version {}", outcome.version)
    }
}

fn print_err(e: &Error) {
    error!("{e:#}");
    if let Some(ae) = e.downcast_ref::<ApkbumpError>() {
        match ae {
            ApkbumpError::InvalidArgsError(_) => {
                println!();
                if let Err(e) = cmd().print_help() {
                    eprintln!("Error printing help: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case::defaults(&["apkbump"], true)]
    #[case::custom_template(&["apkbump", "--checksum-file", "foo-$pkgver.zip"], true)]
    #[case::template_without_pkgver(&["apkbump", "--checksum-file", "foo.zip"], false)]
    #[case::empty_manifest(&["apkbump", "--manifest", ""], false)]
    fn validate(#[case] args: &[&str], #[case] ok: bool) -> Result<()> {
        let matches = cmd().try_get_matches_from(args)?;
        let res = validate_args(&matches);
        assert_eq!(res.is_ok(), ok);
        if let Err(e) = res {
            assert!(e.downcast_ref::<ApkbumpError>().is_some());
        }
        Ok(())
    }

    #[test]
    fn log_level_flags_conflict() {
        assert!(cmd()
            .try_get_matches_from(["apkbump", "--debug", "--quiet"])
            .is_err());
    }

    #[test]
    fn cmd_is_valid() {
        cmd().debug_assert();
    }

    #[test]
    fn help_text_has_no_doubled_words() {
        let help = cmd().render_long_help().to_string();
        assert!(help.contains("The base URL for the GitHub API"), "{help}");
        assert!(!help.contains("The the"), "{help}");
    }

    #[rstest]
    #[case::updated(
        true,
        1,
        1,
        "Updated APKBUILD to version 1.19.0 (sha512 abc123)"
    )]
    #[case::already_current(false, 1, 1, "APKBUILD is already at version 1.19.0")]
    #[case::only_version_field(false, 1, 0, "APKBUILD is already at version 1.19.0")]
    #[case::nothing_matched(
        false,
        0,
        0,
        "APKBUILD has no pkgver=X.Y.Z field or checksum line, so it was not updated to version 1.19.0"
    )]
    fn outcome_message(
        #[case] manifest_updated: bool,
        #[case] version_fields: usize,
        #[case] checksum_lines: usize,
        #[case] expect: &str,
    ) {
        let outcome = SyncOutcome {
            version: "1.19.0".to_string(),
            asset_name: "Northstar.release.v1.19.0.zip".to_string(),
            archive_path: PathBuf::from("Northstar.release.v1.19.0.zip"),
            digest: "abc123".to_string(),
            manifest_path: PathBuf::from("APKBUILD"),
            manifest_updated,
            version_fields,
            checksum_lines,
        };
        assert_eq!(super::outcome_message(&outcome), expect);
    }
}
