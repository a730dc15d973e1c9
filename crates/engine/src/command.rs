//! Input commands and the line parser
//!
//! One command per line. Arguments may be separated by any punctuation, so
//! `W(T1, x2, -5)` and `W T1 x2 -5` parse the same way. Keywords are
//! case-sensitive.

use repcc_core::{Error, Result, SiteId, TxnId, Value, VarId};
use std::fmt;

/// A decoded input command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `begin(T)`
    Begin(TxnId),
    /// `beginRO(T)`
    BeginReadOnly(TxnId),
    /// `R(T, x)`
    Read {
        /// Reader
        txn: TxnId,
        /// Variable
        var: VarId,
    },
    /// `W(T, x, v)`
    Write {
        /// Writer
        txn: TxnId,
        /// Variable
        var: VarId,
        /// New value
        value: Value,
    },
    /// `dump()`
    Dump,
    /// `end(T)`
    End(TxnId),
    /// `fail(s)`
    Fail(SiteId),
    /// `recover(s)`
    Recover(SiteId),
}

impl Command {
    /// Keyword as written in input
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Begin(_) => "begin",
            Command::BeginReadOnly(_) => "beginRO",
            Command::Read { .. } => "R",
            Command::Write { .. } => "W",
            Command::Dump => "dump",
            Command::End(_) => "end",
            Command::Fail(_) => "fail",
            Command::Recover(_) => "recover",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = self.keyword();
        match self {
            Command::Begin(txn) | Command::BeginReadOnly(txn) | Command::End(txn) => {
                write!(f, "{}({})", keyword, txn)
            }
            Command::Read { txn, var } => write!(f, "{}({},{})", keyword, txn, var),
            Command::Write { txn, var, value } => {
                write!(f, "{}({},{},{})", keyword, txn, var, value)
            }
            Command::Dump => write!(f, "{}()", keyword),
            Command::Fail(site) | Command::Recover(site) => write!(f, "{}({})", keyword, site),
        }
    }
}

/// Whether `line` carries no command (blank or a `/` comment)
pub fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('/')
}

fn tokenize(line: &str) -> Vec<&str> {
    let line = match line.find("//") {
        Some(comment) => &line[..comment],
        None => line,
    };
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parse one input line
///
/// Returns `Ok(None)` for blank and comment lines.
///
/// # Errors
///
/// `Error::Parse` for an unknown keyword, a wrong argument count, or a
/// malformed site, variable or value.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    if is_skippable(line) {
        return Ok(None);
    }
    let tokens = tokenize(line);
    let Some((&keyword, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let command = match keyword {
        "begin" => Command::Begin(txn_arg(keyword, args)?),
        "beginRO" => Command::BeginReadOnly(txn_arg(keyword, args)?),
        "end" => Command::End(txn_arg(keyword, args)?),
        "R" => {
            expect_args(keyword, args, 2)?;
            Command::Read {
                txn: TxnId::new(args[0]),
                var: parse_var(args[1])?,
            }
        }
        "W" => {
            expect_args(keyword, args, 3)?;
            Command::Write {
                txn: TxnId::new(args[0]),
                var: parse_var(args[1])?,
                value: parse_value(args[2])?,
            }
        }
        "dump" => {
            expect_args(keyword, args, 0)?;
            Command::Dump
        }
        "fail" => Command::Fail(site_arg(keyword, args)?),
        "recover" => Command::Recover(site_arg(keyword, args)?),
        other => return Err(Error::Parse(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

fn expect_args(keyword: &str, args: &[&str], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(Error::Parse(format!(
            "{} takes {} argument(s), got {}",
            keyword,
            count,
            args.len()
        )))
    }
}

fn txn_arg(keyword: &str, args: &[&str]) -> Result<TxnId> {
    expect_args(keyword, args, 1)?;
    Ok(TxnId::new(args[0]))
}

fn site_arg(keyword: &str, args: &[&str]) -> Result<SiteId> {
    expect_args(keyword, args, 1)?;
    args[0]
        .parse::<u32>()
        .map(SiteId::new)
        .map_err(|_| Error::Parse(format!("invalid site '{}'", args[0])))
}

fn parse_var(token: &str) -> Result<VarId> {
    token.parse().map_err(Error::Parse)
}

fn parse_value(token: &str) -> Result<Value> {
    token
        .parse()
        .map_err(|_| Error::Parse(format!("invalid value '{}'", token)))
}
