//! Manager console command parsing.
//!
//! One command per line. Manual questions use `|` separated fields:
//!
//! ```text
//! add Largest planet? | Mars | Jupiter | Venus | Earth | 2 | 200 | 20 | Space
//! ```
//!
//! The correct answer is given 1-based as the operator sees it; points,
//! time limit and category are optional.

use thiserror::Error;

use super::manager::QuestionDraft;
use crate::generator::DEFAULT_COUNT;
use crate::quiz::{AnimationStyle, OPTION_COUNT};

pub const HELP: &str = "\
Commands:
  add <text> | <a> | <b> | <c> | <d> | <correct 1-4> [| <points> [| <seconds> [| <category>]]]
  gen [-n <count>] <topic>    generate questions
  start | reveal | next | end
  clear                       remove all questions (asks for confirmation)
  style <fade|slide|zoom>     set the presenter animation
  undo                        roll back the last change
  status | list               show the session or the question deck
  open <fragment>             open another view, e.g. open #presenter
  help | quit";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0} (type 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Not a number: {0}")]
    InvalidNumber(String),
}

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(QuestionDraft),
    Generate { topic: String, count: usize },
    Start,
    Reveal,
    Next,
    End,
    Clear,
    Style(AnimationStyle),
    Undo,
    Status,
    List,
    Open(String),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Err(CommandError::Empty),
            "add" => Command::Add(parse_draft(rest)?),
            "gen" | "generate" => parse_generate(rest)?,
            "start" => Command::Start,
            "reveal" => Command::Reveal,
            "next" => Command::Next,
            "end" => Command::End,
            "clear" => Command::Clear,
            "style" => AnimationStyle::parse(rest)
                .map(Command::Style)
                .ok_or(CommandError::Usage("style <fade|slide|zoom>"))?,
            "undo" => Command::Undo,
            "status" => Command::Status,
            "list" | "ls" => Command::List,
            "open" => Command::Open(rest.to_string()),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Interpret a confirmation answer; anything but yes declines
pub fn confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

const ADD_USAGE: &str = "add <text> | <a> | <b> | <c> | <d> | <correct 1-4> [| <points> [| <seconds> [| <category>]]]";

fn parse_draft(rest: &str) -> Result<QuestionDraft, CommandError> {
    let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
    if fields.len() < OPTION_COUNT + 2 || fields.len() > OPTION_COUNT + 5 {
        return Err(CommandError::Usage(ADD_USAGE));
    }

    let mut draft = QuestionDraft {
        text: fields[0].to_string(),
        ..QuestionDraft::default()
    };
    for (slot, field) in draft.options.iter_mut().zip(&fields[1..=OPTION_COUNT]) {
        *slot = field.to_string();
    }

    // Out-of-range answers are left for validation to report
    let correct: usize = parse_number(fields[OPTION_COUNT + 1])?;
    draft.correct_answer = correct.checked_sub(1).unwrap_or(OPTION_COUNT);

    if let Some(points) = fields.get(OPTION_COUNT + 2) {
        draft.points = parse_number(points)?;
    }
    if let Some(seconds) = fields.get(OPTION_COUNT + 3) {
        draft.time_limit = parse_number(seconds)?;
    }
    draft.category = fields
        .get(OPTION_COUNT + 4)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());

    Ok(draft)
}

fn parse_generate(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "gen [-n <count>] <topic>";

    let (count, topic) = match rest.strip_prefix("-n") {
        Some(after) => {
            let after = after.trim_start();
            let (count, topic) = after.split_once(char::is_whitespace).unwrap_or((after, ""));
            (parse_number(count)?, topic.trim())
        }
        None => (DEFAULT_COUNT, rest),
    };

    if topic.is_empty() || count == 0 {
        return Err(CommandError::Usage(USAGE));
    }
    Ok(Command::Generate {
        topic: topic.to_string(),
        count,
    })
}

fn parse_number<T: std::str::FromStr>(field: &str) -> Result<T, CommandError> {
    field
        .trim()
        .parse()
        .map_err(|_| CommandError::InvalidNumber(field.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("start").unwrap(), Command::Start);
        assert_eq!(Command::parse("  REVEAL ").unwrap(), Command::Reveal);
        assert_eq!(Command::parse("next").unwrap(), Command::Next);
        assert_eq!(Command::parse("end").unwrap(), Command::End);
        assert_eq!(Command::parse("clear").unwrap(), Command::Clear);
        assert_eq!(Command::parse("undo").unwrap(), Command::Undo);
        assert_eq!(Command::parse("ls").unwrap(), Command::List);
        assert_eq!(Command::parse("exit").unwrap(), Command::Quit);
        assert_eq!(Command::parse("   ").unwrap_err(), CommandError::Empty);
        assert!(matches!(
            Command::parse("launch").unwrap_err(),
            CommandError::Unknown(cmd) if cmd == "launch"
        ));
    }

    #[test]
    fn test_add_minimal() {
        let cmd = Command::parse("add Largest planet? | Mars | Jupiter | Venus | Earth | 2").unwrap();
        let Command::Add(draft) = cmd else {
            panic!("expected add");
        };
        assert_eq!(draft.text, "Largest planet?");
        assert_eq!(draft.options[1], "Jupiter");
        assert_eq!(draft.correct_answer, 1);
        assert_eq!(draft.points, 100);
        assert_eq!(draft.time_limit, 30);
        assert!(draft.category.is_none());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_add_with_extras() {
        let Command::Add(draft) =
            Command::parse("add Q | a | b | c | d | 4 | 500 | 15 | Science").unwrap()
        else {
            panic!("expected add");
        };
        assert_eq!(draft.correct_answer, 3);
        assert_eq!(draft.points, 500);
        assert_eq!(draft.time_limit, 15);
        assert_eq!(draft.category.as_deref(), Some("Science"));
    }

    #[test]
    fn test_add_errors() {
        assert_eq!(
            Command::parse("add Q | a | b | c").unwrap_err(),
            CommandError::Usage(ADD_USAGE)
        );
        assert_eq!(
            Command::parse("add Q | a | b | c | d | two").unwrap_err(),
            CommandError::InvalidNumber("two".into())
        );

        // Parsed, but rejected by validation
        let Command::Add(draft) = Command::parse("add Q | a | | c | d | 0").unwrap() else {
            panic!("expected add");
        };
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_generate() {
        assert_eq!(
            Command::parse("gen Space Exploration").unwrap(),
            Command::Generate {
                topic: "Space Exploration".into(),
                count: DEFAULT_COUNT
            }
        );
        assert_eq!(
            Command::parse("gen -n 3 1990s music").unwrap(),
            Command::Generate {
                topic: "1990s music".into(),
                count: 3
            }
        );
        assert!(matches!(
            Command::parse("gen").unwrap_err(),
            CommandError::Usage(_)
        ));
        assert!(matches!(
            Command::parse("gen -n 0 art").unwrap_err(),
            CommandError::Usage(_)
        ));
    }

    #[test]
    fn test_style_and_open() {
        assert_eq!(
            Command::parse("style zoom").unwrap(),
            Command::Style(AnimationStyle::Zoom)
        );
        assert!(Command::parse("style spin").is_err());
        assert_eq!(
            Command::parse("open #presenter").unwrap(),
            Command::Open("#presenter".into())
        );
    }

    #[test]
    fn test_confirmation() {
        assert!(confirmed("y"));
        assert!(confirmed(" YES "));
        assert!(!confirmed(""));
        assert!(!confirmed("no"));
    }
}
