//! Line-oriented learner commands.

use crate::error::{DrillError, Result};
use construe_core::{ConstructionType, PracticeMode, Submission};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(Submission),
    Label {
        pair_key: String,
        label: String,
        hinted: bool,
    },
    Reveal,
    Mode(PracticeMode),
    Next,
    Progress,
    Quit,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words: Vec<&str> = line.split_whitespace().collect();
    let hinted = match words.iter().position(|w| *w == "--hint") {
        Some(i) => {
            words.remove(i);
            true
        }
        None => false,
    };
    let (name, args) = match words.split_first() {
        Some((name, args)) => (*name, args),
        None => return Ok(None),
    };

    let command = match name {
        "select" => Command::Select(parse_select(args, hinted)?),
        "label" => match args {
            [pair_key, label] => Command::Label {
                pair_key: pair_key.to_string(),
                label: label.to_string(),
                hinted,
            },
            _ => return Err(usage("label <pair_key> <label> [--hint]")),
        },
        "mode" => match args {
            [mode] => Command::Mode(mode.parse().map_err(DrillError::Command)?),
            _ => return Err(usage("mode <mixed|conditionals|focus:<type>>")),
        },
        "reveal" => no_args(args, Command::Reveal)?,
        "next" => no_args(args, Command::Next)?,
        "progress" => no_args(args, Command::Progress)?,
        "quit" | "exit" => no_args(args, Command::Quit)?,
        other => return Err(DrillError::Command(format!("unknown command: {}", other))),
    };
    Ok(Some(command))
}

fn parse_select(args: &[&str], hinted: bool) -> Result<Submission> {
    let (sid, start, end, rest) = match args {
        [sid, start, end, rest @ ..] if rest.len() <= 2 => (*sid, index(start)?, index(end)?, rest),
        _ => return Err(usage("select <sid> <start> <end> [type] [subtype] [--hint]")),
    };

    let mut submission = Submission::new(sid, start, end);
    let mut rest = rest.iter().copied();
    if let Some(first) = rest.next() {
        match ConstructionType::parse(first) {
            Some(t) => {
                submission = submission.with_type(t);
                if let Some(subtype) = rest.next() {
                    submission = submission.with_subtype(subtype);
                }
            }
            // Without a type the word is a subtype (focus mode).
            None if first != "-" => submission = submission.with_subtype(first),
            None => {
                if let Some(subtype) = rest.next() {
                    submission = submission.with_subtype(subtype);
                }
            }
        }
    }
    if hinted {
        submission = submission.hinted();
    }
    Ok(submission)
}

fn index(word: &str) -> Result<usize> {
    word.parse()
        .map_err(|_| DrillError::Command(format!("not a token index: {}", word)))
}

fn no_args(args: &[&str], command: Command) -> Result<Command> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(DrillError::Command(format!("unexpected arguments: {}", args.join(" "))))
    }
}

fn usage(text: &str) -> DrillError {
    DrillError::Command(format!("usage: {}", text))
}
