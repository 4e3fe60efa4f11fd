//! Session reads and display-name resolution.

use vaultchat_store::{Document, DocumentExt, DocumentStore};
use vaultchat_types::{AuthUser, UNKNOWN_USER};

use crate::auth::AuthProvider;
use crate::error::{ChatError, Result};
use crate::{ChatService, paths};

impl<S: DocumentStore, A: AuthProvider> ChatService<S, A> {
    /// The signed-in principal's id, if any.
    pub fn current_user_id(&self) -> Option<String> {
        self.auth().current_user().map(|u| u.id)
    }

    pub(crate) fn require_user(&self) -> Result<AuthUser> {
        self.auth().current_user().ok_or(ChatError::NotAuthenticated)
    }

    /// Resolve a display name from the directory. Missing records and
    /// missing names fall back to [`UNKNOWN_USER`]; an empty name falls
    /// back to the email's local part.
    pub async fn resolve_display_name(&self, user_id: &str) -> Result<String> {
        let record = self.store().get(paths::USERS, user_id).await?;
        Ok(display_name_from_record(record.as_ref()))
    }
}

fn display_name_from_record(record: Option<&Document>) -> String {
    let Some(body) = record else {
        return UNKNOWN_USER.to_string();
    };
    match body.str_field("name") {
        None => UNKNOWN_USER.to_string(),
        Some("") => body
            .str_field("email")
            .and_then(email_local_part)
            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
        Some(name) => name.to_string(),
    }
}

/// `ash@example.com` -> `ash`. `None` for addresses with no local part.
pub(crate) fn email_local_part(email: &str) -> Option<String> {
    let local = email.split('@').next().unwrap_or_default();
    (!local.is_empty()).then(|| local.to_string())
}
