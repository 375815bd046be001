//! Command line flags
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::dispatch::{Invocation, Mode};
use crate::error::Error;

static LONG_FLAGS: [&str; 9] = [
    "bucket",
    "prefix",
    "destination",
    "list",
    "download",
    "usage",
    "config",
    "help",
    "version",
];

/// List, measure or download the objects under a prefix of an S3 compatible bucket.
///
/// Flags can be given Go style with a single dash, `bucketctl -bucket luxedigest -prefix reports -usage`
#[derive(Parser, Debug)]
#[command(name = "bucketctl", version, about, long_about = None)]
pub struct Cli {
    /// provide the bucketname
    #[arg(long, default_value = "")]
    pub bucket: String,

    /// provide a prefix to act on
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// folder where downloaded items will be placed
    #[arg(long, default_value = "/tmp")]
    pub destination: String,

    /// list items matching prefix
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub list: bool,

    /// download items matching prefix
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub download: bool,

    /// calculate space usage of items matching prefix
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub usage: bool,

    /// the config file for endpoint and keys
    #[arg(long, default_value = "config.yml")]
    pub config: PathBuf,
}

/// Turn `-bucket` and `-bucket=name` into `--bucket` and `--bucket=name`
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::<OsString>::into)
        .enumerate()
        .map(|(idx, arg)| {
            if idx == 0 || passthrough {
                return arg;
            }
            let converted = match arg.to_str() {
                Some("--") => {
                    passthrough = true;
                    None
                }
                Some(s) => match s.strip_prefix('-') {
                    Some(flag)
                        if !flag.starts_with('-')
                            && LONG_FLAGS
                                .contains(&flag.split('=').next().unwrap_or_default()) =>
                    {
                        Some(format!("-{}", s))
                    }
                    _ => None,
                },
                None => None,
            };
            converted.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

impl Cli {
    pub fn mode(&self) -> Option<Mode> {
        if self.list {
            Some(Mode::List)
        } else if self.usage {
            Some(Mode::Usage)
        } else if self.download {
            Some(Mode::Download)
        } else {
            None
        }
    }

    /// Validate the flags before anything touches the network
    pub fn invocation(&self) -> Result<Invocation, Error> {
        if self.bucket.is_empty() {
            return Err(Error::UserError("bucket not specified"));
        }
        if self.download && self.destination.is_empty() {
            return Err(Error::UserError("destination not specified"));
        }
        let mode = self.mode();
        if mode.is_some() && self.prefix.is_empty() {
            return Err(Error::UserError("prefix not specified"));
        }
        Ok(Invocation {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            destination: PathBuf::from(&self.destination),
            mode,
        })
    }
}
