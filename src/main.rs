//! Print the date and/or time a file's contents were created.
//!
//! Designed for scripts that organise photos and videos by date: stdout
//! carries either the formatted date or nothing, and the exit code says why.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use item_time::config::AppConfig;
use item_time::core::format::{format_item_date, DateFormat, Mode};
use item_time::core::item_date::{self, ResolveOptions};
use item_time::shell::{args, env};

// ───────────────────────────────────────── exit codes ────────

const EXIT_USAGE: u8 = 1;
const EXIT_RUNTIME: u8 = 2;
/// Help was shown: no result, but no error either.
const EXIT_HELP: u8 = 255;

// ───────────────────────────────────────── CLI ───────────────

const AFTER_HELP: &str = "\
For pictures the date is Date Taken, for videos it is Media Created.
Other files have no item date unless --fallback-fs is given.

Field order is fixed: year month day hour minute second. The year has four
digits, every other field two, zero padded. Separators may be any string,
including an empty one. --dateonly and --timeonly together print nothing.

The result goes to stdout; messages go to stderr. If stdout is empty, there
is no date.

Legacy switches are accepted too: -dateonly/-do, -timeonly/-to, -iso,
-datesep/-ds, -timesep/-ts, -dtsep/-dts, -h, -help, /?.

Exit codes: 0 success, 1 bad arguments, 2 file could not be read,
3 no item date found, 255 help shown.

Defaults can be stored in $XDG_CONFIG_HOME/item-time/config.toml with
--save-config.";

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Print the date a file's contents were created",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Only output the date part.
    #[arg(short = 'd', long = "dateonly")]
    date_only: bool,

    /// Only output the time part.
    #[arg(short = 't', long = "timeonly")]
    time_only: bool,

    /// ISO 8601 separators: YYYY-MM-DDThh:mm:ss.
    #[arg(long)]
    iso: bool,

    /// Separator between date fields (default "-").
    #[arg(long = "datesep", value_name = "SEP", allow_hyphen_values = true)]
    date_separator: Option<String>,

    /// Separator between time fields (default ":").
    #[arg(long = "timesep", value_name = "SEP", allow_hyphen_values = true)]
    time_separator: Option<String>,

    /// Separator between the date and the time (default " ").
    #[arg(long = "dtsep", value_name = "SEP", allow_hyphen_values = true)]
    datetime_separator: Option<String>,

    /// Fall back to the file's modification time when it has no item date.
    #[arg(long = "fallback-fs")]
    fallback_fs: bool,

    /// Store the effective format as the new default.
    #[arg(long = "save-config")]
    save_config: bool,

    /// The file to get the date from. Environment variables are expanded.
    #[arg(value_name = "FILENAME")]
    files: Vec<OsString>,
}

impl Cli {
    /// Layer command-line flags over the stored defaults. Explicit separators
    /// win over `--iso`.
    fn effective_format(&self, stored: &DateFormat) -> DateFormat {
        let mut format = stored.clone();
        if self.iso {
            format.apply_iso();
        }
        if let Some(sep) = &self.date_separator {
            format.date_separator = sep.clone();
        }
        if let Some(sep) = &self.time_separator {
            format.time_separator = sep.clone();
        }
        if let Some(sep) = &self.datetime_separator {
            format.datetime_separator = sep.clone();
        }
        if self.date_only || self.time_only {
            format.mode = Mode::from_flags(self.date_only, self.time_only);
        }
        format
    }
}

// ───────────────────────────────────────── main ──────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr) // never pollute stdout
        .init();

    match run(std::env::args_os().collect()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

fn run(raw: Vec<OsString>) -> Result<ExitCode> {
    let normalized = match args::normalize(raw) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };
    for ignored in &normalized.ignored {
        eprintln!("Unknown option ignored: {ignored}");
    }

    let cli = match Cli::try_parse_from(&normalized.args) {
        Ok(cli) => cli,
        Err(e) => return Ok(report_clap(e)),
    };

    let config = AppConfig::load();
    let format = cli.effective_format(&config.format);
    let options = ResolveOptions {
        fallback_to_modified: cli.fallback_fs || config.fallback_to_modified,
    };

    // Arguments are checked before anything is persisted.
    let file = match args::single_filename(cli.files) {
        Ok(file) => Some(file),
        Err(args::ArgsError::NoFilename) if cli.save_config => None,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };

    if cli.save_config {
        let updated = AppConfig {
            format: format.clone(),
            fallback_to_modified: options.fallback_to_modified,
        };
        let path = updated.save().context("failed to save config")?;
        tracing::info!("saved defaults to {}", path.display());
    }
    let Some(file) = file else {
        return Ok(ExitCode::SUCCESS);
    };

    let path = match file.to_str() {
        Some(s) => PathBuf::from(env::expand(s)),
        None => PathBuf::from(file),
    };
    let shown = std::path::absolute(&path).unwrap_or_else(|_| path.clone());

    match item_date::resolve(&path, &options) {
        Ok(date) => {
            tracing::debug!(source = %date.source, "{}", shown.display());
            println!("{}", format_item_date(&date.when, &format));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::debug!("{e}");
            eprintln!("Failed to get item date for \"{}\".", shown.display());
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

/// Help goes to stderr like every other message; stdout is reserved for
/// the result.
fn report_clap(e: clap::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            eprint!("{}", e.render());
            ExitCode::from(EXIT_HELP)
        }
        ErrorKind::DisplayVersion => {
            print!("{}", e.render());
            ExitCode::SUCCESS
        }
        _ => {
            eprint!("{}", e.render());
            ExitCode::from(EXIT_USAGE)
        }
    }
}
