// 👤 Credentialed Accounts - argon2id hashing, login, client registration
// The core never looks at credentials; an email/password pair becomes an
// Account here and the boundary layer issues the bearer token.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::access::{can_administer, Caller};
use crate::directory::PersonDirectory;
use crate::error::{DomainError, Result};
use crate::model::{Account, AccountId, NewAccount, Role};
use crate::store::Store;

/// Hash a password, returning the PHC string (salt and parameters included).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::Internal(format!("Failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| DomainError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::Validation(format!("Invalid email '{}'", email)));
    }
    Ok(email)
}

/// Body of a client registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    pub legal_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub email: String,
    pub role: Role,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        AccountSummary {
            id: account.id,
            email: account.email.clone(),
            role: account.role,
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    directory: PersonDirectory,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        AccountService {
            directory: PersonDirectory::new(store.clone()),
            store,
        }
    }

    /// Same error for unknown email and wrong password.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Account> {
        let invalid = || DomainError::Unauthorized("Invalid credentials".to_string());

        let email = normalize_email(email).map_err(|_| invalid())?;
        let account = self.store.find_account_by_email(&email)?.ok_or_else(invalid)?;

        if !verify_password(password, &account.password_hash)? {
            debug!("Password mismatch for account {}", account.id);
            return Err(invalid());
        }

        Ok(account)
    }

    /// Create a CLIENT account linked to the person holding `legal_id`.
    pub fn register_client(
        &self,
        caller: &Caller,
        registration: &ClientRegistration,
    ) -> Result<AccountSummary> {
        if !can_administer(caller.role) {
            return Err(DomainError::Forbidden(
                "Only administrators can register clients".to_string(),
            ));
        }

        let email = normalize_email(&registration.email)?;
        if registration.password.is_empty() {
            return Err(DomainError::Validation("Password is required".to_string()));
        }

        if self.store.find_account_by_email(&email)?.is_some() {
            return Err(DomainError::Conflict("Email already exists".to_string()));
        }

        let person = self.directory.resolve_by_legal_id(
            &registration.legal_id,
            &registration.name,
            registration.phone.as_deref(),
        )?;

        let account = self.insert_account(NewAccount {
            email,
            password_hash: hash_password(&registration.password)?,
            role: Role::Client,
            person_id: Some(person.id),
        })?;

        info!("Registered client account {} for person {}", account.id, person.id);
        Ok(AccountSummary::from(&account))
    }

    /// Make sure an ADMIN account exists for `email`. An existing account is
    /// returned untouched; the flag tells whether one was created.
    pub fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        legal_id: &str,
        name: &str,
    ) -> Result<(Account, bool)> {
        let email = normalize_email(email)?;
        let person = self.directory.resolve_by_legal_id(legal_id, name, None)?;

        if let Some(existing) = self.store.find_account_by_email(&email)? {
            return Ok((existing, false));
        }

        let account = self.insert_account(NewAccount {
            email,
            password_hash: hash_password(password)?,
            role: Role::Admin,
            person_id: Some(person.id),
        })?;

        info!("Created admin account {}", account.id);
        Ok((account, true))
    }

    fn insert_account(&self, account: NewAccount) -> Result<Account> {
        match self.store.insert_account(&account) {
            Ok(account) => Ok(account),
            Err(err) if err.is_duplicate_key() => Err(DomainError::Conflict(
                "Email or person already has an account".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }
}
