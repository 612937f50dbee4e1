//! Declared argument specs and the parser that turns raw tokens into typed values.
//!
//! Optional arguments backtrack: when a token does not fit an optional spec the spec is
//! skipped and the token is offered to the next one. That lets `fly on` and `fly bob on`
//! share one spec list.

use std::collections::HashMap;

use thiserror::Error;

use crate::host::{GameServer, PlayerRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A single whitespace-free token.
    Word,
    /// A connected player, resolved by name.
    OnlinePlayer,
    /// Any known player, online or offline.
    User,
    Integer,
    /// `true/false`, `on/off`, `yes/no`.
    Bool,
    /// Every remaining token, joined by single spaces.
    Remaining,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub key: String,
    pub kind: ArgKind,
    pub optional: bool,
    /// Sub-permission suffix the caller must hold when this argument is supplied.
    pub requires_suffix: Option<String>,
}

impl ArgSpec {
    fn new(key: &str, kind: ArgKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
            optional: false,
            requires_suffix: None,
        }
    }

    pub fn word(key: &str) -> Self {
        Self::new(key, ArgKind::Word)
    }

    pub fn player(key: &str) -> Self {
        Self::new(key, ArgKind::OnlinePlayer)
    }

    pub fn user(key: &str) -> Self {
        Self::new(key, ArgKind::User)
    }

    pub fn integer(key: &str) -> Self {
        Self::new(key, ArgKind::Integer)
    }

    pub fn boolean(key: &str) -> Self {
        Self::new(key, ArgKind::Bool)
    }

    pub fn remaining(key: &str) -> Self {
        Self::new(key, ArgKind::Remaining)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn requiring(mut self, suffix: &str) -> Self {
        self.requires_suffix = Some(suffix.to_ascii_lowercase());
        self
    }

    pub fn usage(&self) -> String {
        let body = match self.kind {
            ArgKind::Remaining => format!("{}...", self.key),
            _ => self.key.clone(),
        };
        if self.optional {
            format!("[{}]", body)
        } else {
            format!("<{}>", body)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Player(PlayerRef),
    Integer(i64),
    Bool(bool),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("missing argument <{0}>")]
    Missing(String),
    #[error("no player named '{0}' has joined this server")]
    UnknownPlayer(String),
    #[error("player '{0}' is not online")]
    NotOnline(String),
    #[error("'{value}' is not a number for <{key}>")]
    NotANumber { key: String, value: String },
    #[error("'{value}' is not true/false for <{key}>")]
    NotABool { key: String, value: String },
    #[error("too many arguments: {0}")]
    TooMany(String),
}

/// Typed arguments of one invocation, keyed by spec key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    values: HashMap<String, ArgValue>,
}

impl ParsedArgs {
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ArgValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn player(&self, key: &str) -> Option<&PlayerRef> {
        match self.values.get(key) {
            Some(ArgValue::Player(p)) => Some(p),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(ArgValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: &str, value: ArgValue) {
        self.values.insert(key.to_string(), value);
    }
}

fn parse_bool(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "enable" => Some(true),
        "false" | "off" | "no" | "disable" => Some(false),
        _ => None,
    }
}

fn parse_one(spec: &ArgSpec, token: &str, server: &dyn GameServer) -> Result<ArgValue, ArgError> {
    match spec.kind {
        ArgKind::Word | ArgKind::Remaining => Ok(ArgValue::Text(token.to_string())),
        ArgKind::OnlinePlayer => match server.find_online(token) {
            Some(p) => Ok(ArgValue::Player(p)),
            None if server.find_user(token).is_some() => Err(ArgError::NotOnline(token.to_string())),
            None => Err(ArgError::UnknownPlayer(token.to_string())),
        },
        ArgKind::User => server
            .find_user(token)
            .map(ArgValue::Player)
            .ok_or_else(|| ArgError::UnknownPlayer(token.to_string())),
        ArgKind::Integer => token
            .parse::<i64>()
            .map(ArgValue::Integer)
            .map_err(|_| ArgError::NotANumber {
                key: spec.key.clone(),
                value: token.to_string(),
            }),
        ArgKind::Bool => parse_bool(token).map(ArgValue::Bool).ok_or_else(|| ArgError::NotABool {
            key: spec.key.clone(),
            value: token.to_string(),
        }),
    }
}

/// Parse whitespace-separated `tokens` against `specs`.
pub fn parse_args(specs: &[ArgSpec], tokens: &[&str], server: &dyn GameServer) -> Result<ParsedArgs, ArgError> {
    let mut parsed = ParsedArgs::default();
    let mut pos = 0usize;

    for spec in specs {
        let Some(token) = tokens.get(pos) else {
            if spec.optional {
                continue;
            }
            return Err(ArgError::Missing(spec.key.clone()));
        };

        if spec.kind == ArgKind::Remaining {
            parsed.insert(&spec.key, ArgValue::Text(tokens[pos..].join(" ")));
            pos = tokens.len();
            continue;
        }

        match parse_one(spec, token, server) {
            Ok(value) => {
                parsed.insert(&spec.key, value);
                pos += 1;
            }
            Err(_) if spec.optional => continue,
            Err(e) => return Err(e),
        }
    }

    if pos < tokens.len() {
        return Err(ArgError::TooMany(tokens[pos..].join(" ")));
    }
    Ok(parsed)
}
