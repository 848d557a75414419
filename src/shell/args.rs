//! Command-line compatibility layer.
//!
//! Scripts written for the Windows tool pass switches as `-dateonly`,
//! `/?`, `-DS .` and so on, case-insensitively. [`normalize`] rewrites those
//! into the `--long` forms clap understands before parsing, so both styles
//! keep working.

use std::ffi::{OsStr, OsString};

/// A legacy switch and the clap long option it maps to.
struct Switch {
    names: &'static [&'static str],
    long: &'static str,
    takes_value: bool,
}

const SWITCHES: &[Switch] = &[
    Switch { names: &["dateonly", "do"], long: "dateonly", takes_value: false },
    Switch { names: &["timeonly", "to"], long: "timeonly", takes_value: false },
    Switch { names: &["iso"], long: "iso", takes_value: false },
    Switch { names: &["h", "help", "?"], long: "help", takes_value: false },
    Switch { names: &["datesep", "ds"], long: "datesep", takes_value: true },
    Switch { names: &["timesep", "ts"], long: "timesep", takes_value: true },
    Switch { names: &["dtsep", "dts"], long: "dtsep", takes_value: true },
];

/// Single-character flags clap defines itself; passed through untouched.
const NATIVE_SHORTS: &[&str] = &["-d", "-t", "-V"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("Missing argument for {0}")]
    MissingValue(String),
    #[error("No filename given.")]
    NoFilename,
    #[error("Only one filename allowed. In parameters, found \"{first}\" and also \"{second}\".")]
    TooManyFilenames { first: String, second: String },
}

/// Result of rewriting the raw argument vector.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Normalized {
    pub args: Vec<OsString>,
    /// Unrecognised switches that were dropped, for the caller to report.
    pub ignored: Vec<String>,
}

fn lookup_legacy(name: &str) -> Option<&'static Switch> {
    let lower = name.to_ascii_lowercase();
    SWITCHES.iter().find(|s| s.names.contains(&lower.as_str()))
}

fn lookup_long(name: &str) -> Option<&'static Switch> {
    SWITCHES.iter().find(|s| s.long == name)
}

/// Rewrite legacy switches in `raw` (including `argv[0]`) to clap syntax.
///
/// Value-taking switches are emitted as `--name=value` so separators that
/// begin with `-` are never mistaken for flags.
pub fn normalize<I>(raw: I) -> Result<Normalized, ArgsError>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut iter = raw.into_iter().map(Into::into);
    let mut out = Normalized::default();
    out.args.extend(iter.next());

    while let Some(arg) = iter.next() {
        let Some(text) = arg.to_str() else {
            // Non-UTF-8 can only be a filename.
            out.args.push(arg);
            continue;
        };

        if text == "--" {
            out.args.push(arg);
            out.args.extend(iter.by_ref());
            break;
        }

        if let Some(long) = text.strip_prefix("--") {
            match lookup_long(long) {
                Some(switch) if switch.takes_value => {
                    let value = iter
                        .next()
                        .ok_or_else(|| ArgsError::MissingValue(text.to_string()))?;
                    out.args.push(joined(switch.long, &value));
                }
                _ => out.args.push(arg),
            }
            continue;
        }

        let legacy = text
            .strip_prefix('-')
            .or_else(|| text.strip_prefix('/'))
            .filter(|name| !name.is_empty());
        let Some(name) = legacy else {
            out.args.push(arg);
            continue;
        };

        if let Some(switch) = lookup_legacy(name) {
            if switch.takes_value {
                let value = iter
                    .next()
                    .ok_or_else(|| ArgsError::MissingValue(text.to_string()))?;
                out.args.push(joined(switch.long, &value));
            } else {
                out.args.push(format!("--{}", switch.long).into());
            }
        } else if NATIVE_SHORTS.contains(&text) {
            out.args.push(arg);
        } else if text.starts_with('/') && !cfg!(windows) {
            // An absolute Unix path, not a switch.
            out.args.push(arg);
        } else {
            out.ignored.push(text.to_string());
        }
    }

    Ok(out)
}

fn joined(long: &str, value: &OsStr) -> OsString {
    let mut s = OsString::from(format!("--{long}="));
    s.push(value);
    s
}

/// Enforce exactly one filename among the positional arguments.
pub fn single_filename(mut files: Vec<OsString>) -> Result<OsString, ArgsError> {
    match files.len() {
        0 => Err(ArgsError::NoFilename),
        1 => Ok(files.remove(0)),
        _ => Err(ArgsError::TooManyFilenames {
            first: files[0].to_string_lossy().into_owned(),
            second: files[1].to_string_lossy().into_owned(),
        }),
    }
}
