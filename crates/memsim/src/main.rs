//! Command-line driver for the memory allocation simulator.
//!
//! ```text
//! memsim --policy best dynamic --capacity 1000 "alloc 1 212" "alloc 2 417" "free 1" status
//! memsim --trace 212,417,112,426 unequal --partitions 100,500,200,300,600
//! memsim --script ops.txt buddy --capacity 1024 --min-block 32
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    process,
    str::FromStr,
};

use allocator::{Allocator as _, Memory, Policy, Technique};
use argh::FromArgs;
use log::{LevelFilter, info, warn};
use snafu::ResultExt as _;

use crate::{
    error::{CliError, Report, cli_error},
    render::Renderer,
    script::Op,
    session::Session,
    style::Palette,
};

mod error;
mod logger;
mod render;
mod script;
mod session;
mod style;

/// Simulate classical memory allocation techniques.
#[derive(Debug, FromArgs)]
struct Args {
    /// placement policy: first, best or worst (default: best for unequal, first otherwise)
    #[argh(option)]
    policy: Option<Policy>,
    /// read operations from a script file before the positional ones
    #[argh(option)]
    script: Option<PathBuf>,
    /// comma-separated process sizes to place in order, reporting where each landed
    #[argh(option)]
    trace: Option<Sizes>,
    /// stop at the first failed operation
    #[argh(switch)]
    strict: bool,
    /// maximum log level (default: info)
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,
    /// log at debug level or above
    #[argh(switch, short = 'v')]
    verbose: bool,
    /// disable colored output
    #[argh(switch)]
    no_color: bool,
    #[argh(subcommand)]
    command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Fixed(FixedCommand),
    Unequal(UnequalCommand),
    Dynamic(DynamicCommand),
    Buddy(BuddyCommand),
    Paging(PagingCommand),
}

/// Fixed-size partitioning.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "fixed")]
struct FixedCommand {
    /// total memory size
    #[argh(option)]
    capacity: usize,
    /// size of every partition
    #[argh(option)]
    partition_size: usize,
    /// operations to run, such as "alloc 1 212" or "status"
    #[argh(positional)]
    ops: Vec<String>,
}

/// Unequal-size partitioning.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "unequal")]
struct UnequalCommand {
    /// comma-separated partition sizes, in address order
    #[argh(option)]
    partitions: Sizes,
    /// let one process occupy several partitions
    #[argh(switch)]
    spanning: bool,
    /// operations to run, such as "alloc 1 212" or "status"
    #[argh(positional)]
    ops: Vec<String>,
}

/// Dynamic allocation with coalescing.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "dynamic")]
struct DynamicCommand {
    /// total memory size
    #[argh(option)]
    capacity: usize,
    /// operations to run, such as "alloc 1 212" or "status"
    #[argh(positional)]
    ops: Vec<String>,
}

/// Buddy system.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "buddy")]
struct BuddyCommand {
    /// total memory size, a power of two
    #[argh(option)]
    capacity: usize,
    /// smallest block handed out, a power of two
    #[argh(option)]
    min_block: usize,
    /// operations to run, such as "alloc 1 212" or "status"
    #[argh(positional)]
    ops: Vec<String>,
}

/// Paging.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "paging")]
struct PagingCommand {
    /// total memory size, a multiple of the frame size
    #[argh(option)]
    capacity: usize,
    /// size of every frame
    #[argh(option)]
    frame_size: usize,
    /// operations to run, such as "alloc 1 212" or "status"
    #[argh(positional)]
    ops: Vec<String>,
}

impl Command {
    fn technique(&self) -> Technique {
        match self {
            Self::Fixed(cmd) => Technique::Fixed {
                capacity: cmd.capacity,
                partition_size: cmd.partition_size,
            },
            Self::Unequal(cmd) => Technique::Unequal {
                partitions: cmd.partitions.0.clone(),
                spanning: cmd.spanning,
            },
            Self::Dynamic(cmd) => Technique::Dynamic {
                capacity: cmd.capacity,
            },
            Self::Buddy(cmd) => Technique::Buddy {
                capacity: cmd.capacity,
                min_block: cmd.min_block,
            },
            Self::Paging(cmd) => Technique::Paging {
                capacity: cmd.capacity,
                frame_size: cmd.frame_size,
            },
        }
    }

    fn ops(&self) -> &[String] {
        match self {
            Self::Fixed(cmd) => &cmd.ops,
            Self::Unequal(cmd) => &cmd.ops,
            Self::Dynamic(cmd) => &cmd.ops,
            Self::Buddy(cmd) => &cmd.ops,
            Self::Paging(cmd) => &cmd.ops,
        }
    }
}

/// A comma-separated list of sizes, such as `100,500,200`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Sizes(Vec<usize>);

impl FromStr for Sizes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(|size| {
                let size = size.trim();
                size.parse()
                    .map_err(|err| format!("invalid size {size:?}: {err}"))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

fn main() {
    let args: Args = argh::from_env();
    let palette = Palette::new(!args.no_color);

    if let Err(err) = run(&args, palette) {
        eprint!("{}", Report::new(&err, palette));
        process::exit(1);
    }
}

fn run(args: &Args, palette: Palette) -> Result<(), CliError> {
    let level = if args.verbose {
        args.log_level.max(LevelFilter::Debug)
    } else {
        args.log_level
    };
    logger::init(level, palette).context(cli_error::InstallLoggerSnafu)?;

    let technique = args.command.technique();
    let memory = Memory::new(&technique).context(cli_error::InvalidConfigSnafu {
        technique: technique.clone(),
    })?;
    let policy = args.policy.unwrap_or_else(|| technique.default_policy());
    if args.policy.is_some() && !technique.uses_policy() {
        warn!("{technique} ignores the placement policy");
    }
    info!("{technique} over {} units, {policy}", memory.capacity());

    let ops = collect_ops(args)?;
    let renderer = Renderer::new(&technique, palette);
    let mut session =
        Session::new(technique, memory, policy, renderer, io::stdout().lock()).strict(args.strict);

    if let Some(Sizes(sizes)) = &args.trace {
        session.trace(sizes)?;
    }
    for (origin, op) in &ops {
        session.run(origin, *op)?;
    }
    if args.trace.is_none() && ops.is_empty() {
        session.run("status", Op::Status)?;
    }
    Ok(())
}

/// Parses the script file, then the positional operations, naming each by
/// where it came from.
fn collect_ops(args: &Args) -> Result<Vec<(String, Op)>, CliError> {
    let mut ops = Vec::new();
    if let Some(path) = &args.script {
        let text = fs::read_to_string(path).context(cli_error::ReadScriptSnafu { path })?;
        for (index, line) in text.lines().enumerate() {
            let origin = format!("{}:{}", display_name(path), index + 1);
            push_op(&mut ops, origin, line)?;
        }
    }
    for (index, line) in args.command.ops().iter().enumerate() {
        push_op(&mut ops, format!("argument {}", index + 1), line)?;
    }
    Ok(ops)
}

fn push_op(ops: &mut Vec<(String, Op)>, origin: String, line: &str) -> Result<(), CliError> {
    let parsed = script::parse_line(line).context(cli_error::ParseScriptSnafu {
        origin: origin.as_str(),
    })?;
    if let Some(op) = parsed {
        ops.push((origin, op));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sizes() {
        assert_eq!(
            "100,500, 200".parse::<Sizes>(),
            Ok(Sizes(vec![100, 500, 200]))
        );
        assert_eq!(
            "100,x".parse::<Sizes>().unwrap_err(),
            "invalid size \"x\": invalid digit found in string"
        );
    }

    #[test]
    fn test_args() {
        let args = Args::from_args(
            &["memsim"],
            &[
                "--policy",
                "worst",
                "-v",
                "unequal",
                "--partitions",
                "100,500",
                "--spanning",
                "alloc 1 550",
                "status",
            ],
        )
        .unwrap();
        assert_eq!(args.policy, Some(Policy::WorstFit));
        assert!(args.verbose);
        assert_eq!(
            args.command.technique(),
            Technique::Unequal {
                partitions: vec![100, 500],
                spanning: true,
            }
        );
        assert_eq!(args.command.ops(), ["alloc 1 550", "status"]);
    }

    #[test]
    fn test_collect_ops_names_origin() {
        let args = Args::from_args(
            &["memsim"],
            &["dynamic", "--capacity", "10", "# setup", "alloc 1 5", "stats"],
        )
        .unwrap();
        let ops = collect_ops(&args).unwrap();
        let origins: Vec<_> = ops.iter().map(|(origin, _)| origin.as_str()).collect();
        assert_eq!(origins, ["argument 2", "argument 3"]);

        let args = Args::from_args(&["memsim"], &["dynamic", "--capacity", "10", "alloc"])
            .unwrap();
        let err = collect_ops(&args).unwrap_err();
        assert_eq!(err.to_string(), "failed to parse argument 1");
    }
}
