//! Identity providers
//!
//! Sign-in and sign-up are delegated to an [`IdentityProvider`]. The app is
//! handed one at construction time; there is no process-wide user table.
//! [`LocalIdentityProvider`] is the in-memory provider used for demos and
//! tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::UserIdentity;

/// Email of the demo account
pub const DEMO_EMAIL: &str = "test@example.com";
/// Password of the demo account
pub const DEMO_PASSWORD: &str = "password123";
/// Identity reference of the demo account
pub const DEMO_USER_ID: &str = "123456";
/// Display name of the demo account
pub const DEMO_NAME: &str = "Test User";
/// Name given to accounts created without one
pub const DEFAULT_NAME: &str = "New Farmer";

/// Identity provider error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Sign-up with an email that is already registered
    #[error("Email already in use: {0}")]
    EmailInUse(String),

    /// Missing email or password
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Source of user identities
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify credentials and return the identity
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity>;

    /// Register a new identity; `name` defaults to [`DEFAULT_NAME`]
    async fn sign_up(&self, email: &str, password: &str, name: Option<&str>)
        -> Result<UserIdentity>;
}

#[derive(Debug, Clone)]
struct Account {
    identity: UserIdentity,
    password: String,
}

/// In-memory identity registry keyed by lowercased email
#[derive(Debug, Default)]
pub struct LocalIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
}

impl LocalIdentityProvider {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the demo account
    pub fn with_demo_account() -> Self {
        let provider = Self::new();
        provider.register(
            UserIdentity::new(DEMO_USER_ID, DEMO_EMAIL, DEMO_NAME),
            DEMO_PASSWORD,
        );
        provider
    }

    /// Add an account with a known identity, replacing any with the same email
    pub fn register(&self, identity: UserIdentity, password: impl Into<String>) {
        let email = normalize(&identity.email);
        let identity = UserIdentity { email: email.clone(), ..identity };
        self.accounts.write().insert(email, Account { identity, password: password.into() });
    }

    /// Number of registered accounts
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Whether no account is registered
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let accounts = self.accounts.read();
        match accounts.get(&normalize(email)) {
            Some(account) if account.password == password => Ok(account.identity.clone()),
            _ => {
                tracing::debug!("sign-in rejected for unknown email or wrong password");
                Err(IdentityError::InvalidCredentials)
            }
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<UserIdentity> {
        let email = normalize(email);
        if email.is_empty() {
            return Err(IdentityError::InvalidInput("email is required".to_string()));
        }
        if password.is_empty() {
            return Err(IdentityError::InvalidInput("password is required".to_string()));
        }

        let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(DEFAULT_NAME);

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&email) {
            return Err(IdentityError::EmailInUse(email));
        }

        let identity = UserIdentity::new(Uuid::new_v4().to_string(), email.clone(), name);
        accounts.insert(
            email,
            Account { identity: identity.clone(), password: password.to_string() },
        );
        tracing::info!(user_id = %identity.id, "registered new identity");
        Ok(identity)
    }
}
