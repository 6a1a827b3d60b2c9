//! Access-token rotation.
//!
//! The pool hands out the first token that is not cooling down. A token that
//! earned a 403 is stamped with the current time and skipped until the
//! cooldown has elapsed. Cooldown state lives only in memory.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Default time a token stays unusable after a 403.
pub const DEFAULT_COOLDOWN: Duration = Duration::hours(1);

/// A bearer token. The secret never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building the `Authorization` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

struct Slot {
    token: Token,
    expired_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_valid(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.expired_at {
            None => true,
            Some(at) => now - at >= cooldown,
        }
    }
}

/// Ordered set of tokens shared between fetch workers.
pub struct TokenPool {
    slots: Mutex<Vec<Slot>>,
    cooldown: Duration,
}

impl TokenPool {
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_cooldown(secrets, DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown<I, S>(secrets: I, cooldown: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = secrets
            .into_iter()
            .map(|s| Slot {
                token: Token::new(s),
                expired_at: None,
            })
            .collect();

        Self {
            slots: Mutex::new(slots),
            cooldown,
        }
    }

    /// First token, in configured order, that is not cooling down.
    pub fn get_valid(&self) -> Option<Token> {
        let now = Utc::now();
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .find(|slot| slot.is_valid(now, self.cooldown))
            .map(|slot| slot.token.clone())
    }

    /// Mark `token` as expired now. Unknown tokens are ignored.
    pub fn expire(&self, token: &Token) {
        let now = Utc::now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.iter_mut().find(|slot| &slot.token == token) {
            slot.expired_at = Some(now);
            tracing::warn!(
                cooldown_secs = self.cooldown.num_seconds(),
                "token rejected, cooling down"
            );
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TokenPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPool")
            .field("tokens", &self.len())
            .field("cooldown", &self.cooldown)
            .finish()
    }
}
