//! Ad-hoc statements accepted by the query gateway.
//!
//! A [`WhitelistedQuery`] can only be obtained through [`WhitelistedQuery::parse`], so any
//! value handed to a store has already passed the command whitelist.

use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Select,
    Insert,
}

impl CommandKind {
    /// The closed whitelist. Anything else is refused before reaching a store.
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "SELECT" => Some(CommandKind::Select),
            "INSERT" => Some(CommandKind::Insert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Select => "SELECT",
            CommandKind::Insert => "INSERT",
        }
    }
}

/// A bound parameter. Values never become part of the statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    fn from_json(index: usize, value: &Value) -> Result<Self, QueryRejection> {
        match value {
            Value::Null => Ok(SqlParam::Null),
            Value::Bool(b) => Ok(SqlParam::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(SqlParam::Int(i)),
                None => n
                    .as_f64()
                    .map(SqlParam::Float)
                    .ok_or(QueryRejection::NonScalarParam { index }),
            },
            Value::String(s) => Ok(SqlParam::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(QueryRejection::NonScalarParam { index }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryRejection {
    #[error("Missing SQL query parameter")]
    MissingSql,

    #[error("Unauthorized SQL command: {0}")]
    UnauthorizedCommand(String),

    #[error("Unauthorized SQL command: only one statement may be executed per request")]
    MultipleStatements,

    #[error("Parameter {index} must be a scalar value")]
    NonScalarParam { index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhitelistedQuery {
    command_kind: CommandKind,
    sql_text: String,
    params: Vec<SqlParam>,
    returning: bool,
}

impl WhitelistedQuery {
    /// Normalize `sql`, check its command against the whitelist and convert `params`.
    pub fn parse(sql: &str, params: &[Value]) -> Result<Self, QueryRejection> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(QueryRejection::MissingSql);
        }

        let keyword = trimmed
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();

        let command_kind = CommandKind::from_keyword(&keyword).ok_or_else(|| {
            let shown = if keyword.is_empty() {
                trimmed.split_whitespace().next().unwrap_or_default().to_string()
            } else {
                keyword.clone()
            };
            QueryRejection::UnauthorizedCommand(shown)
        })?;

        let tokens = scan(trimmed);

        // Trailing terminators are tolerated; anything after a `;` is a second statement.
        let mut terminated = false;
        for (token, _) in &tokens {
            match token {
                Token::Terminator => terminated = true,
                _ if terminated => return Err(QueryRejection::MultipleStatements),
                _ => {}
            }
        }

        // Drop trailing terminators and comments so clauses can be appended safely.
        let end = tokens
            .iter()
            .rev()
            .find(|(token, _)| *token != Token::Terminator)
            .map(|(_, end)| *end)
            .unwrap_or(trimmed.len());
        let body = &trimmed[..end];
        let returning = tokens
            .iter()
            .any(|(token, _)| matches!(token, Token::Word(word) if word == "RETURNING"));

        let params = params
            .iter()
            .enumerate()
            .map(|(i, v)| SqlParam::from_json(i + 1, v))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            command_kind,
            sql_text: body.to_string(),
            params,
            returning,
        })
    }

    pub fn command_kind(&self) -> CommandKind {
        self.command_kind
    }

    pub fn sql_text(&self) -> &str {
        &self.sql_text
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    /// Whether the statement already names a `RETURNING` clause outside literals and comments.
    pub fn has_returning_clause(&self) -> bool {
        self.returning
    }

    /// Statement text to send for an INSERT so the new row's key can be reported.
    pub fn insert_statement(&self) -> Cow<'_, str> {
        if self.has_returning_clause() {
            Cow::Borrowed(&self.sql_text)
        } else {
            Cow::Owned(format!("{}\nRETURNING *", self.sql_text))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word, uppercased.
    Word(String),
    Terminator,
    Other,
}

/// Split `sql` into tokens paired with their end offset, skipping whitespace and comments.
///
/// String literals, quoted identifiers and dollar-quoted bodies become a single `Other`, so
/// nothing inside them reads as a keyword or a terminator.
fn scan(sql: &str) -> Vec<(Token, usize)> {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let offset = |i: usize| chars.get(i).map(|(at, _)| *at).unwrap_or(sql.len());
    let at = |i: usize| chars.get(i).map(|(_, c)| *c);

    let mut tokens = Vec::new();
    let mut i = 0;
    while let Some(c) = at(i) {
        let next = at(i + 1);
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '-' if next == Some('-') => {
                while at(i).is_some_and(|c| c != '\n') {
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                // Block comments nest.
                let mut depth = 0;
                while let Some(c) = at(i) {
                    match (c, at(i + 1)) {
                        ('/', Some('*')) => {
                            depth += 1;
                            i += 2;
                        }
                        ('*', Some('/')) => {
                            depth -= 1;
                            i += 2;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => i += 1,
                    }
                }
                continue;
            }
            '\'' | '"' => {
                // E'...' strings honour backslash escapes.
                let escapes = c == '\''
                    && i > 0
                    && matches!(at(i - 1), Some('e' | 'E'))
                    && !(i > 1 && at(i - 2).is_some_and(is_word_char));
                i = skip_quoted(&chars, i, c, escapes);
                Token::Other
            }
            '$' => {
                i = skip_dollar_quoted(&chars, i).unwrap_or(i + 1);
                Token::Other
            }
            ';' => {
                i += 1;
                Token::Terminator
            }
            c if is_word_char(c) => {
                let start = i;
                while at(i).is_some_and(is_word_char) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                Token::Word(word.to_ascii_uppercase())
            }
            _ => {
                i += 1;
                Token::Other
            }
        };
        tokens.push((token, offset(i)));
    }
    tokens
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Index just past the quote that closes the one at `start`. Doubled quotes are escapes.
fn skip_quoted(chars: &[(usize, char)], start: usize, quote: char, escapes: bool) -> usize {
    let mut i = start + 1;
    while let Some(&(_, c)) = chars.get(i) {
        if escapes && c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1).map(|(_, c)| *c) == Some(quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Index just past a `$tag$ ... $tag$` body starting at `start`, or `None` when the `$`
/// opens a positional parameter instead.
fn skip_dollar_quoted(chars: &[(usize, char)], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if chars.get(i).is_some_and(|(_, c)| c.is_ascii_digit()) {
        return None;
    }
    while chars.get(i).is_some_and(|(_, c)| is_word_char(*c)) {
        i += 1;
    }
    if chars.get(i).map(|(_, c)| *c) != Some('$') {
        return None;
    }
    let tag: Vec<char> = chars[start..=i].iter().map(|(_, c)| *c).collect();
    let mut k = i + 1;
    while k + tag.len() <= chars.len() {
        if chars[k..k + tag.len()].iter().map(|(_, c)| *c).eq(tag.iter().copied()) {
            return Some(k + tag.len());
        }
        k += 1;
    }
    Some(chars.len())
}

/// Result of one gateway call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Rows {
        rows: Vec<Map<String, Value>>,
    },
    Inserted {
        inserted_id: Option<i64>,
        rows_affected: u64,
    },
}
