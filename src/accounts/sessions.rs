//! Bearer-token sessions.
//!
//! Tokens are never stored; only their SHA-256 hash maps to the `Actor`
//! the token was issued for.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::crypto::{generate_token, hash_token};
use crate::workflow::Actor;

/// Expired entries are swept once the registry grows past this size.
const SWEEP_THRESHOLD: usize = 1000;

#[derive(Debug)]
struct SessionEntry {
    actor: Actor,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<[u8; 32], SessionEntry>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Issue a new token for `actor`. Returns the plaintext token.
    pub fn issue(&mut self, actor: Actor) -> String {
        if self.sessions.len() >= SWEEP_THRESHOLD {
            self.sweep();
        }
        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            SessionEntry {
                actor,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// The actor behind a live token.
    pub fn validate(&self, token: &str) -> Option<Actor> {
        self.sessions
            .get(&hash_token(token))
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.actor.clone())
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(&hash_token(token)).is_some()
    }

    /// Drop every session of a user, e.g. after a role or password change.
    pub fn revoke_user(&mut self, user_id: &Uuid) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.actor.user_id != *user_id);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        self.sessions.retain(|_, entry| now < entry.expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Role;

    fn actor() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role: Role::Sdm,
            district_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn issued_token_validates() {
        let mut registry = SessionRegistry::new(Duration::from_secs(60));
        let who = actor();
        let token = registry.issue(who.clone());
        assert_eq!(registry.validate(&token), Some(who));
        assert_eq!(registry.validate("forged"), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut registry = SessionRegistry::new(Duration::from_secs(60));
        let token = registry.issue(actor());
        registry
            .sessions
            .values_mut()
            .for_each(|entry| entry.expires_at = Instant::now() - Duration::from_secs(1));
        assert_eq!(registry.validate(&token), None);
        registry.sweep();
        assert!(registry.is_empty());
    }

    #[test]
    fn revoke_single_and_per_user() {
        let mut registry = SessionRegistry::new(Duration::from_secs(60));
        let who = actor();
        let first = registry.issue(who.clone());
        let second = registry.issue(who.clone());
        let other = registry.issue(actor());

        assert!(registry.revoke(&first));
        assert!(!registry.revoke(&first));
        assert_eq!(registry.revoke_user(&who.user_id), 1);
        assert_eq!(registry.validate(&second), None);
        assert!(registry.validate(&other).is_some());
        assert_eq!(registry.len(), 1);
    }
}
