//! Decides whether an inbound webhook payload deserves a reply.

pub mod seen;

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::AdmissionConfig;
use crate::platform::Update;
use seen::SeenMessages;

const BOT_COMMAND_ENTITY: &str = "bot_command";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject(RejectReason),
}

impl Admission {
    #[cfg(test)]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NoMessage,
    FromBot,
    NoText,
    NotCommand,
    NoBotCommandEntity,
    AlreadySeen,
    TooOld { age_secs: i64 },
    FromTheFuture { ahead_secs: i64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoMessage => write!(f, "no message"),
            RejectReason::FromBot => write!(f, "sent by a bot"),
            RejectReason::NoText => write!(f, "no text"),
            RejectReason::NotCommand => write!(f, "not the price command"),
            RejectReason::NoBotCommandEntity => write!(f, "no bot_command entity"),
            RejectReason::AlreadySeen => write!(f, "already seen"),
            RejectReason::TooOld { age_secs } => write!(f, "too old ({}s)", age_secs),
            RejectReason::FromTheFuture { ahead_secs } => {
                write!(f, "dated {}s in the future", ahead_secs)
            }
        }
    }
}

pub struct AdmissionFilter {
    command: String,
    max_age_secs: i64,
    seen: Mutex<SeenMessages>,
}

impl AdmissionFilter {
    pub fn new(command: impl Into<String>, max_age: Duration, prune_threshold: usize) -> Self {
        let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        Self {
            command: command.into(),
            max_age_secs,
            seen: Mutex::new(SeenMessages::new(max_age_secs, prune_threshold)),
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.max_age(),
            config.seen_capacity,
        )
    }

    /// Evaluate `update` at time `now`.
    ///
    /// The message id is recorded before anything else is checked, so a
    /// repeated id is never admitted even when its first delivery was rejected
    /// for another reason.
    pub fn admit(&self, update: &Update, now: DateTime<Utc>) -> Admission {
        let Some(message) = update.message.as_ref() else {
            return Admission::Reject(RejectReason::NoMessage);
        };

        let now_secs = now.timestamp();
        let is_new = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .mark_seen(message.id, message.timestamp, now_secs);

        let is_from_bot = message.sender_is_bot();
        let text = message.text.as_deref().filter(|t| !t.is_empty());
        let is_command = text.is_some_and(|t| t.starts_with(&self.command));
        let has_command_entity = message.has_entity(BOT_COMMAND_ENTITY);
        let age_secs = now_secs.saturating_sub(message.timestamp);

        debug!(
            "Message {} in chat {}: from_bot={}, has_text={}, is_command={}, is_new={}, \
             has_command_entity={}, age_secs={}",
            message.id,
            message.chat_id(),
            is_from_bot,
            text.is_some(),
            is_command,
            is_new,
            has_command_entity,
            age_secs
        );

        let reason = if is_from_bot {
            RejectReason::FromBot
        } else if text.is_none() {
            RejectReason::NoText
        } else if !is_command {
            RejectReason::NotCommand
        } else if !has_command_entity {
            RejectReason::NoBotCommandEntity
        } else if !is_new {
            RejectReason::AlreadySeen
        } else if age_secs < 0 {
            RejectReason::FromTheFuture {
                ahead_secs: age_secs.saturating_neg(),
            }
        } else if age_secs > self.max_age_secs {
            RejectReason::TooOld { age_secs }
        } else {
            return Admission::Admit;
        };

        Admission::Reject(reason)
    }

    /// Forget ids that can no longer pass the age check.
    pub fn prune_seen(&self, now: DateTime<Utc>) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .prune(now.timestamp())
    }

    pub fn seen_count(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
