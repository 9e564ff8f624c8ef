//! Command routing: chat text and structured events to [`Intent`].
//!
//! Handles:
//! - Fixed case-insensitive command patterns (`virtual server start web`)
//! - Structured NLP events (`serverlifecycle.start` with a `vsname` parameter)

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::compute::ServerAction;

/// Prefix of structured event names.
pub const EVENT_NAMESPACE: &str = "serverlifecycle";

/// Parameter carrying the target server name in structured events.
pub const PARAM_VSNAME: &str = "vsname";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Help,
    List,
    Start,
    Stop,
    Reboot,
    Destroy,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::Help,
        Verb::List,
        Verb::Start,
        Verb::Stop,
        Verb::Reboot,
        Verb::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Help => "help",
            Verb::List => "list",
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Reboot => "reboot",
            Verb::Destroy => "destroy",
        }
    }

    pub fn from_name(name: &str) -> Option<Verb> {
        Verb::ALL.into_iter().find(|v| v.as_str() == name)
    }

    pub fn action(&self) -> Option<ServerAction> {
        match self {
            Verb::Start => Some(ServerAction::Start),
            Verb::Stop => Some(ServerAction::Stop),
            Verb::Reboot => Some(ServerAction::Reboot),
            Verb::Destroy => Some(ServerAction::Destroy),
            Verb::Help | Verb::List => None,
        }
    }

    /// Localized message key used when the target could not be extracted.
    pub fn parse_problem_key(&self) -> String {
        format!("cognitive.parse.problem.{}", self.as_str())
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized request, however it was recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    List,
    Help,
    Start(String),
    Stop(String),
    Reboot(String),
    Destroy(String),
}

impl Intent {
    /// Build a targeted intent. Returns `None` for verbs without a target.
    pub fn with_target(verb: Verb, name: String) -> Option<Intent> {
        match verb {
            Verb::Start => Some(Intent::Start(name)),
            Verb::Stop => Some(Intent::Stop(name)),
            Verb::Reboot => Some(Intent::Reboot(name)),
            Verb::Destroy => Some(Intent::Destroy(name)),
            Verb::Help | Verb::List => None,
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Intent::List => Verb::List,
            Intent::Help => Verb::Help,
            Intent::Start(_) => Verb::Start,
            Intent::Stop(_) => Verb::Stop,
            Intent::Reboot(_) => Verb::Reboot,
            Intent::Destroy(_) => Verb::Destroy,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Intent::Start(n) | Intent::Stop(n) | Intent::Reboot(n) | Intent::Destroy(n) => {
                Some(n)
            }
            Intent::List | Intent::Help => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("could not determine the target of '{0}'")]
    MissingTarget(Verb),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),
}

/// A pre-parsed event from the natural-language collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentEvent {
    pub name: String,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
}

impl IntentEvent {
    pub fn new(verb: Verb, vsname: Option<&str>) -> Self {
        let parameters = vsname.map(|name| {
            let mut map = Map::new();
            map.insert(PARAM_VSNAME.to_string(), Value::String(name.to_string()));
            map
        });
        Self {
            name: format!("{}.{}", EVENT_NAMESPACE, verb),
            parameters,
        }
    }

    fn vsname(&self) -> Option<&str> {
        self.parameters
            .as_ref()?
            .get(PARAM_VSNAME)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Turn a structured event into an intent.
///
/// A targeted verb without a usable `vsname` is a [`ParseError::MissingTarget`];
/// there is no fallback to text matching.
pub fn parse_event(event: &IntentEvent) -> Result<Intent, ParseError> {
    let verb = event
        .name
        .strip_prefix(EVENT_NAMESPACE)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(Verb::from_name)
        .ok_or_else(|| ParseError::UnknownEvent(event.name.clone()))?;

    match verb {
        Verb::List => Ok(Intent::List),
        Verb::Help => Ok(Intent::Help),
        _ => {
            let name = event.vsname().ok_or(ParseError::MissingTarget(verb))?;
            Intent::with_target(verb, name.to_string()).ok_or(ParseError::MissingTarget(verb))
        }
    }
}

fn patterns() -> &'static [(Verb, Regex)] {
    static PATTERNS: OnceLock<Vec<(Verb, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Verb::Help, r"(?i)\bvirtual servers?\s+help\b"),
            (Verb::List, r"(?i)\b(vs|virtual servers?)\s+(show|list)\b"),
            (Verb::Start, r"(?i)\b(vs|virtual server)\s+start\s+(.*)"),
            (Verb::Stop, r"(?i)\b(vs|virtual server)\s+stop\s+(.*)"),
            (Verb::Reboot, r"(?i)\b(vs|virtual server)\s+(restart|reboot)\s+(.*)"),
            (
                Verb::Destroy,
                r"(?i)\b(vs|virtual server)\s+(remove|delete|destroy)\s+(.*)",
            ),
        ]
        .into_iter()
        .filter_map(|(verb, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((verb, re)),
            Err(e) => {
                tracing::error!("Invalid pattern for {}: {}", verb, e);
                None
            }
        })
        .collect()
    })
}

/// Match chat text against the command patterns.
///
/// Returns `None` when the text is not a virtual server command.
///
/// # Examples
///
/// ```
/// use vsbot::bot::intent::{parse_text, Intent};
///
/// let intent = parse_text("@bot virtual server start web-1").unwrap();
/// assert_eq!(intent, Intent::Start("web-1".to_string()));
/// ```
pub fn parse_text(text: &str) -> Option<Intent> {
    for (verb, re) in patterns() {
        let Some(caps) = re.captures(text) else {
            continue;
        };

        match verb {
            Verb::Help => return Some(Intent::Help),
            Verb::List => return Some(Intent::List),
            _ => {
                // The target is always the last group.
                let target = caps.get(caps.len() - 1)?.as_str().trim();
                if target.is_empty() {
                    continue;
                }
                return Intent::with_target(*verb, target.to_string());
            }
        }
    }
    None
}
