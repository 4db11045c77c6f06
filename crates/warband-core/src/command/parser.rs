//! Tokenizer and recursive-descent reader for the command grammar.
//!
//! Reading happens in two passes. The first builds a generic [`Term`] tree
//! (`head(arg, arg, ...)`) without knowing any keyword. The second
//! interprets the tree against the grammar. Every term keeps the slice of
//! source it was read from so errors can quote it.

use crate::entity::{EntityId, Role, Team};
use crate::error::{ParseError, ParseErrorKind};

use super::{Command, Order, StateExpr, UnitSpec};

/// Deepest nesting any valid command needs is `update_state(id, command(id, move(x, y)))`.
const MAX_DEPTH: usize = 4;

/// A generic `head(args...)` term.
#[derive(Debug)]
struct Term<'a> {
    head: &'a str,
    args: Option<Vec<Term<'a>>>,
    text: &'a str,
}

impl<'a> Term<'a> {
    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.text.trim())
    }

    /// The term as a bare atom, rejecting `head(...)` forms.
    fn atom(&self, kind: ParseErrorKind) -> Result<&'a str, ParseError> {
        match self.args {
            None => Ok(self.head),
            Some(_) => Err(self.error(kind)),
        }
    }
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn atom(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_atom_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => ParseError::new(ParseErrorKind::UnexpectedChar(c), self.rest()),
                None => ParseError::new(ParseErrorKind::UnexpectedEnd, self.src.trim()),
            });
        }
        Ok(&self.src[start..self.pos])
    }

    fn term(&mut self, depth: usize) -> Result<Term<'a>, ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::new(ParseErrorKind::TooDeep, self.rest()));
        }
        self.skip_whitespace();
        let start = self.pos;
        let head = self.atom()?;
        self.skip_whitespace();

        let args = if self.peek() == Some('(') {
            self.pos += 1;
            Some(self.arguments(depth)?)
        } else {
            None
        };

        Ok(Term {
            head,
            args,
            text: &self.src[start..self.pos],
        })
    }

    /// Reads `arg, arg, ... )` after an opening parenthesis.
    fn arguments(&mut self, depth: usize) -> Result<Vec<Term<'a>>, ParseError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.term(depth + 1)?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(args);
                }
                Some(c) => {
                    return Err(ParseError::new(ParseErrorKind::UnexpectedChar(c), self.rest()))
                }
                None => return Err(ParseError::new(ParseErrorKind::UnexpectedEnd, self.src.trim())),
            }
        }
    }
}

fn is_atom_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')
}

/// Reads one complete top-level term.
fn read(src: &str) -> Result<Term<'_>, ParseError> {
    let mut reader = Reader::new(src);
    let term = reader.term(0)?;
    reader.skip_whitespace();
    if reader.pos != src.len() {
        return Err(ParseError::new(ParseErrorKind::TrailingInput, reader.rest()));
    }
    Ok(term)
}

// =============================================================================
// Interpretation
// =============================================================================

/// Parses a top-level command.
pub(super) fn parse_command(src: &str) -> Result<Command, ParseError> {
    let term = read(src)?;
    let Some(args) = term.args.as_deref() else {
        return match term.head {
            "idle" => Ok(Command::Bare(Order::Idle)),
            "dead" => Ok(Command::Bare(Order::Dead)),
            other => Err(term.error(ParseErrorKind::UnknownKeyword(other.to_string()))),
        };
    };

    match term.head {
        "new_unit" => {
            arity(&term, "new_unit", "6", args.len() == 6)?;
            let role = role(&args[0])?;
            Ok(Command::NewUnit(UnitSpec {
                role,
                id: entity_id(&args[1])?,
                x: number(&args[2])?,
                y: number(&args[3])?,
                rotation: number(&args[4])?,
                team: team(&args[5])?,
            }))
        }
        "update_state" => {
            arity(&term, "update_state", "2", args.len() == 2)?;
            Ok(Command::UpdateState {
                id: entity_id(&args[0])?,
                state: state_expr(&args[1])?,
            })
        }
        "move" => match args {
            [x, y] => Ok(Command::Move {
                subject: None,
                x: number(x)?,
                y: number(y)?,
            }),
            [id, x, y] => Ok(Command::Move {
                subject: Some(entity_id(id)?),
                x: number(x)?,
                y: number(y)?,
            }),
            _ => Err(arity_error(&term, "move", "2 or 3", args.len())),
        },
        "shoot" => match args {
            [target] => Ok(Command::Shoot {
                subject: None,
                target: entity_id(target)?,
            }),
            [id, target] => Ok(Command::Shoot {
                subject: Some(entity_id(id)?),
                target: entity_id(target)?,
            }),
            _ => Err(arity_error(&term, "shoot", "1 or 2", args.len())),
        },
        "command" => {
            arity(&term, "command", "2", args.len() == 2)?;
            Ok(Command::Order {
                target: entity_id(&args[0])?,
                order: order(&args[1])?,
            })
        }
        "idle" | "dead" if args.is_empty() => parse_command(term.head),
        other => Err(term.error(ParseErrorKind::UnknownKeyword(other.to_string()))),
    }
}

fn state_expr(term: &Term<'_>) -> Result<StateExpr, ParseError> {
    match (term.head, term.args.as_deref()) {
        ("command", Some(args)) => {
            arity(term, "command", "2", args.len() == 2)?;
            Ok(StateExpr::Command {
                target: entity_id(&args[0])?,
                order: order(&args[1])?,
            })
        }
        _ => order(term).map(StateExpr::Order),
    }
}

fn order(term: &Term<'_>) -> Result<Order, ParseError> {
    match (term.head, term.args.as_deref()) {
        ("idle", None | Some([])) => Ok(Order::Idle),
        ("dead", None | Some([])) => Ok(Order::Dead),
        ("move", Some(args)) => {
            arity(term, "move", "2", args.len() == 2)?;
            Ok(Order::Move {
                x: number(&args[0])?,
                y: number(&args[1])?,
            })
        }
        ("shoot", Some(args)) => {
            arity(term, "shoot", "1", args.len() == 1)?;
            Ok(Order::Shoot {
                target: entity_id(&args[0])?,
            })
        }
        ("command", Some(_)) => Err(term.error(ParseErrorKind::NestedCommand)),
        ("idle" | "dead", Some(args)) => Err(arity_error(term, "state", "0", args.len())),
        (other, _) => Err(term.error(ParseErrorKind::UnknownKeyword(other.to_string()))),
    }
}

fn arity(
    term: &Term<'_>,
    keyword: &'static str,
    expected: &'static str,
    ok: bool,
) -> Result<(), ParseError> {
    if ok {
        Ok(())
    } else {
        Err(arity_error(
            term,
            keyword,
            expected,
            term.args.as_ref().map_or(0, Vec::len),
        ))
    }
}

fn arity_error(
    term: &Term<'_>,
    keyword: &'static str,
    expected: &'static str,
    found: usize,
) -> ParseError {
    term.error(ParseErrorKind::Arity {
        keyword,
        expected,
        found,
    })
}

fn role(term: &Term<'_>) -> Result<Role, ParseError> {
    let raw = term.atom(ParseErrorKind::UnknownRole(term.head.to_string()))?;
    match raw.parse::<Role>() {
        Ok(role) if role.is_spawnable() => Ok(role),
        _ => Err(term.error(ParseErrorKind::UnknownRole(raw.to_string()))),
    }
}

fn entity_id(term: &Term<'_>) -> Result<EntityId, ParseError> {
    let raw = term.atom(ParseErrorKind::InvalidId)?;
    if EntityId::is_valid_token(raw) {
        Ok(EntityId::new(raw))
    } else {
        Err(term.error(ParseErrorKind::InvalidId))
    }
}

fn number(term: &Term<'_>) -> Result<f64, ParseError> {
    let raw = term.atom(ParseErrorKind::InvalidNumber)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(term.error(ParseErrorKind::InvalidNumber)),
    }
}

fn team(term: &Term<'_>) -> Result<Team, ParseError> {
    let raw = term.atom(ParseErrorKind::InvalidTeam)?;
    raw.parse::<u32>()
        .ok()
        .and_then(Team::new)
        .ok_or_else(|| term.error(ParseErrorKind::InvalidTeam))
}
