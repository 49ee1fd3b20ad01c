//! Script operations.
//!
//! A script is a list of lines, each holding at most one operation:
//!
//! ```text
//! # comment
//! alloc <id> <size> [first|best|worst]
//! free <id>
//! status
//! stats
//! pages <id>
//! ```

use std::{num::ParseIntError, str::FromStr};

use allocator::{ParsePolicyError, Policy, ProcessId};
use snafu::{OptionExt as _, ResultExt as _, Snafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Alloc {
        id: ProcessId,
        size: usize,
        policy: Option<Policy>,
    },
    Free {
        id: ProcessId,
    },
    Status,
    Stats,
    Pages {
        id: ProcessId,
    },
}

#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub(crate)))]
pub enum ParseOpError {
    #[snafu(display("unknown operation {op:?}"))]
    UnknownOp { op: String },
    #[snafu(display("`{op}` expects a {what}"))]
    MissingArgument {
        op: &'static str,
        what: &'static str,
    },
    #[snafu(display("unexpected argument {extra:?} after `{op}`"))]
    TrailingArgument { op: &'static str, extra: String },
    #[snafu(display("invalid {what} {input:?}"))]
    InvalidNumber {
        what: &'static str,
        input: String,
        source: ParseIntError,
    },
    #[snafu(display("invalid policy for `alloc`"))]
    InvalidPolicy { source: ParsePolicyError },
}

/// Parses one script line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Op>, ParseOpError> {
    let line = line.split_once('#').map_or(line, |(code, _)| code);
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let (op, parsed) = match name {
        "alloc" => {
            let id = next_id(&mut words, "alloc")?;
            let size = next_number(&mut words, "alloc", "size")?;
            let policy = words
                .next()
                .map(Policy::from_str)
                .transpose()
                .context(parse_op_error::InvalidPolicySnafu)?;
            ("alloc", Op::Alloc { id, size, policy })
        }
        "free" => {
            let id = next_id(&mut words, "free")?;
            ("free", Op::Free { id })
        }
        "pages" => {
            let id = next_id(&mut words, "pages")?;
            ("pages", Op::Pages { id })
        }
        "status" => ("status", Op::Status),
        "stats" => ("stats", Op::Stats),
        _ => return parse_op_error::UnknownOpSnafu { op: name }.fail(),
    };

    if let Some(extra) = words.next() {
        return parse_op_error::TrailingArgumentSnafu { op, extra }.fail();
    }
    Ok(Some(parsed))
}

fn next_number<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    op: &'static str,
    what: &'static str,
) -> Result<usize, ParseOpError> {
    let input = words
        .next()
        .context(parse_op_error::MissingArgumentSnafu { op, what })?;
    input
        .parse()
        .context(parse_op_error::InvalidNumberSnafu { what, input })
}

fn next_id<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    op: &'static str,
) -> Result<ProcessId, ParseOpError> {
    let what = "process id";
    let input = words
        .next()
        .context(parse_op_error::MissingArgumentSnafu { op, what })?;
    let raw: u32 = input
        .parse()
        .context(parse_op_error::InvalidNumberSnafu { what, input })?;
    Ok(ProcessId::new(raw))
}
