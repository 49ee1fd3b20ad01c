use std::{error::Error, fmt, io, path::PathBuf};

use allocator::{AllocateError, ConfigError, DeallocateError, Technique};
use log::SetLoggerError;
use snafu::{Location, Snafu};

use crate::{
    script::ParseOpError,
    style::{Color, Palette},
};

#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("failed to install the logger"))]
    InstallLogger {
        source: SetLoggerError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("invalid {technique} configuration"))]
    InvalidConfig {
        technique: Technique,
        source: ConfigError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to read script {}", path.display()))]
    ReadScript {
        path: PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to parse {origin}"))]
    ParseScript {
        origin: String,
        source: ParseOpError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{origin} failed"))]
    Allocate {
        origin: String,
        source: AllocateError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{origin} failed"))]
    Deallocate {
        origin: String,
        source: DeallocateError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{origin} needs paging, but memory uses {technique}"))]
    NotPaging {
        origin: String,
        technique: Technique,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to write output"))]
    WriteOutput {
        source: io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl CliError {
    pub fn location(&self) -> &Location {
        match self {
            Self::InstallLogger { location, .. }
            | Self::InvalidConfig { location, .. }
            | Self::ReadScript { location, .. }
            | Self::ParseScript { location, .. }
            | Self::Allocate { location, .. }
            | Self::Deallocate { location, .. }
            | Self::NotPaging { location, .. }
            | Self::WriteOutput { location, .. } => location,
        }
    }
}

/// Prints an error with its location and the chain of its causes.
pub struct Report<'a> {
    error: &'a CliError,
    palette: Palette,
}

impl<'a> Report<'a> {
    pub fn new(error: &'a CliError, palette: Palette) -> Self {
        Self { error, palette }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { error, palette } = self;
        writeln!(f, "Error: {}", palette.paint(Color::Red, error))?;
        writeln!(
            f,
            "  at {}",
            palette.paint(Color::DarkGray, error.location())
        )?;
        let mut source = error.source();
        if source.is_some() {
            writeln!(f)?;
            writeln!(f, "Caused by:")?;
        }
        let mut index = 0;
        while let Some(s) = source {
            writeln!(f, "{index:4}: {}", palette.paint(Color::Red, s))?;
            source = s.source();
            index += 1;
        }
        Ok(())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use snafu::ResultExt as _;

    use super::*;
    use crate::script;

    #[test]
    fn test_report_lists_causes() {
        let err = script::parse_line("alloc 1 x")
            .context(cli_error::ParseScriptSnafu {
                origin: "argument 1",
            })
            .unwrap_err();
        let report = Report::new(&err, Palette::PLAIN).to_string();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines[0], "Error: failed to parse argument 1");
        assert!(lines[1].starts_with("  at "));
        assert_eq!(lines[3], "Caused by:");
        assert_eq!(lines[4], "   0: invalid size \"x\"");
        assert_eq!(lines[5], "   1: invalid digit found in string");
    }
}
