//! C6 — Auth Facade.
//!
//! Deliberately minimal: a boundary the core consumes, not the hard
//! part (`spec.md` §4.6). Password verification follows the teacher's
//! `bcrypt`-based approach (`auth::user_store::UserStore`); token
//! issuance departs from the teacher's stateless JWT (`auth::jwt`)
//! because `spec.md` requires opaque, in-process-bound tokens — see
//! SPEC_FULL.md §4 and DESIGN.md for the rationale.

use std::collections::HashMap;

use parking_lot::RwLock;
use rand::RngCore;
use tracing::{debug, warn};

/// Pluggable, non-persistent backing store for username -> password hash.
/// Persisted credential storage is an external collaborator per
/// `spec.md` §1/§6; this trait is the seam for it.
pub trait CredentialStore: Send + Sync {
    /// Returns the bcrypt hash for `username`, if the user exists.
    fn password_hash(&self, username: &str) -> Option<String>;
}

/// Seeded-at-startup in-memory implementation, sufficient for the core's
/// own test/demo purposes.
pub struct InMemoryCredentialStore {
    users: HashMap<String, String>,
}

impl InMemoryCredentialStore {
    pub fn new(users: impl IntoIterator<Item = (String, String)>) -> anyhow::Result<Self> {
        let mut hashed = HashMap::new();
        for (username, password) in users {
            let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
            hashed.insert(username, hash);
        }
        Ok(Self { users: hashed })
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn password_hash(&self, username: &str) -> Option<String> {
        self.users.get(username).cloned()
    }
}

/// 32 bytes of randomness, hex-encoded, per token.
const TOKEN_BYTES: usize = 32;

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

struct TokenEntry {
    username: String,
    revoked: bool,
}

/// Opaque-token issuance and verification. Binding between tokens and
/// usernames is kept entirely in-process (`spec.md` §4.6) — there is no
/// way to recover a username from a token without this map.
pub struct AuthFacade {
    credentials: Box<dyn CredentialStore>,
    tokens: RwLock<HashMap<String, TokenEntry>>,
}

impl AuthFacade {
    pub fn new(credentials: Box<dyn CredentialStore>) -> Self {
        Self {
            credentials,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Verify `password` against the stored hash using bcrypt's
    /// constant-time comparison, then mint and register a fresh token.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<String> {
        let hash = self.credentials.password_hash(username)?;
        let ok = bcrypt::verify(password, &hash).unwrap_or(false);
        if !ok {
            warn!(username, "authentication failed: bad password");
            return None;
        }

        let token = generate_token();
        self.tokens.write().insert(
            token.clone(),
            TokenEntry {
                username: username.to_string(),
                revoked: false,
            },
        );
        debug!(username, "issued token");
        Some(token)
    }

    /// Resolve a token to its bound username. Unknown and revoked tokens
    /// fail identically — a client cannot distinguish "never existed"
    /// from "revoked" (`spec.md` §4.6).
    pub fn verify_token(&self, token: &str) -> Option<String> {
        let tokens = self.tokens.read();
        let entry = tokens.get(token)?;
        if entry.revoked {
            return None;
        }
        Some(entry.username.clone())
    }

    pub fn revoke(&self, token: &str) {
        if let Some(entry) = self.tokens.write().get_mut(token) {
            entry.revoked = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facade() -> AuthFacade {
        let store = InMemoryCredentialStore::new([("alice".to_string(), "hunter2".to_string())]).unwrap();
        AuthFacade::new(Box::new(store))
    }

    #[test]
    fn correct_password_issues_working_token() {
        let f = facade();
        let token = f.authenticate("alice", "hunter2").expect("should authenticate");
        assert_eq!(f.verify_token(&token), Some("alice".to_string()));
    }

    #[test]
    fn wrong_password_issues_no_token() {
        let f = facade();
        assert!(f.authenticate("alice", "wrong").is_none());
    }

    #[test]
    fn revoked_token_fails_like_unknown_token() {
        let f = facade();
        let token = f.authenticate("alice", "hunter2").unwrap();
        f.revoke(&token);
        assert_eq!(f.verify_token(&token), None);
        assert_eq!(f.verify_token("not-a-real-token"), None);
    }
}
