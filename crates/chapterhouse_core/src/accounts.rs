//! crates/chapterhouse_core/src/accounts.rs
//!
//! Profile reads and edits for the signed-in account.

use std::sync::Arc;
use uuid::Uuid;

use crate::authz::require_identity;
use crate::domain::Account;
use crate::error::{conflict_as_field, CoreResult};
use crate::ports::DatabaseService;
use crate::validation::{check_present, is_valid_email, normalize_email, FieldErrors};

#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<dyn DatabaseService>,
}

impl ProfileService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn current(&self, actor: Option<Uuid>) -> CoreResult<Account> {
        let account_id = require_identity(actor)?;
        Ok(self.db.get_account(account_id).await?)
    }

    pub async fn update(&self, actor: Option<Uuid>, edit: ProfileEdit) -> CoreResult<Account> {
        let account = self.current(actor).await?;

        let name = edit.name.unwrap_or(account.name);
        let email = edit
            .email
            .map(|email| normalize_email(&email))
            .unwrap_or(account.email);
        let bio = edit.bio.or(account.bio).filter(|bio| !bio.is_empty());

        let mut errors = FieldErrors::new();
        check_present(&mut errors, "name", &name);
        if email.is_empty() {
            errors.add("email", "can't be blank");
        } else if !is_valid_email(&email) {
            errors.add("email", "is invalid");
        }
        errors.into_result()?;

        self.db
            .update_profile(account.id, &name, &email, bio.as_deref())
            .await
            .map_err(conflict_as_field("email"))
    }
}
