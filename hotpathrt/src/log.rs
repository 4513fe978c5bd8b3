//! The implementation of the `HP_LOG` environment variable.

use std::{env, error::Error, fs::File, io::Write, path::PathBuf};
use strum::{EnumCount, FromRepr};

/// How verbose should logging be?
#[repr(u8)]
#[derive(Copy, Clone, Debug, EnumCount, FromRepr, PartialEq, PartialOrd)]
pub(crate) enum Verbosity {
    /// Disable logging entirely.
    Disabled,
    /// Log errors.
    Error,
    /// Log warnings (e.g. a failed recording attempt).
    Warning,
    /// Log transitions of a [TreeAnchor](crate::anchor::TreeAnchor).
    AnchorTransition,
    /// Log JIT events (e.g. start/stop recording).
    JitEvent,
}

pub(crate) struct Log {
    /// The requested [Verbosity] level.
    level: Verbosity,
    /// The path to write to. `None` means stderr.
    path: Option<PathBuf>,
}

impl Log {
    /// Parse `HP_LOG`, which has the format `[<path|->:]<level>`. An unset
    /// variable logs errors to stderr.
    pub(crate) fn new() -> Result<Self, Box<dyn Error>> {
        match env::var("HP_LOG") {
            Ok(s) => {
                let (path, level) = match s.split(':').collect::<Vec<_>>()[..] {
                    [path, level] => {
                        if path == "-" {
                            (None, level)
                        } else {
                            let path = PathBuf::from(path);
                            // Truncate any existing log file so appends don't
                            // pile onto a previous run.
                            File::create(&path).ok();
                            (Some(path), level)
                        }
                    }
                    [level] => (None, level),
                    [..] => return Err("HP_LOG must be of the format `[<path|->:]<level>`".into()),
                };
                let level = level
                    .parse::<u8>()
                    .map_err(|e| format!("Invalid HP_LOG level '{s}': {e}"))?;
                let max_level = u8::try_from(Verbosity::COUNT).unwrap() - 1;
                let level = Verbosity::from_repr(level)
                    .ok_or_else(|| format!("HP_LOG level {level} exceeds maximum {max_level}"))?;
                Ok(Self { path, level })
            }
            Err(_) => Ok(Self {
                path: None,
                level: Verbosity::Error,
            }),
        }
    }

    pub(crate) fn log(&self, level: Verbosity, msg: &str) {
        if level == Verbosity::Disabled || level > self.level {
            return;
        }
        match &self.path {
            Some(p) => {
                File::options()
                    .append(true)
                    .open(p)
                    .map(|mut f| f.write_all(format!("hp: {msg}\n").as_bytes()))
                    .ok();
            }
            None => eprintln!("hp: {msg}"),
        }
    }
}
