//! User directory: search and the login-time profile upsert.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use vaultchat_store::{Document, DocumentExt, DocumentStore, Query, StoredDocument, to_document};
use vaultchat_types::{UNKNOWN_USER, UserProfile};

use crate::auth::AuthProvider;
use crate::error::Result;
use crate::identity::email_local_part;
use crate::{ChatService, paths};

/// Appended to a prefix to form the inclusive upper bound of its range.
/// High enough that no stored name or email sorts after it.
const PREFIX_CEILING: char = '\u{f8ff}';

impl<S: DocumentStore, A: AuthProvider> ChatService<S, A> {
    /// Search the directory by email or name.
    ///
    /// Stages run in order (exact email, exact lowercased email, prefix on
    /// the lowercased name, prefix on the raw name) and the first stage
    /// with any hit wins. The signed-in principal is excluded from
    /// results. A failed stage falls through to the next one unless the
    /// backend is unreachable altogether.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let current_id = self.current_user_id().unwrap_or_default();
        let query_lower = trimmed.to_lowercase();

        let stages: [(&str, Query); 4] = [
            ("email", Query::collection(paths::USERS).filter_eq("email", trimmed)),
            (
                "searchableEmail",
                Query::collection(paths::USERS).filter_eq("searchableEmail", query_lower.clone()),
            ),
            ("searchableName", prefix_query("searchableName", &query_lower)),
            ("name", prefix_query("name", trimmed)),
        ];

        for (stage, stage_query) in stages {
            match self.store().query(&stage_query).await {
                Ok(docs) if !docs.is_empty() => {
                    debug!(stage, hits = docs.len(), "user search matched");
                    return Ok(docs
                        .into_iter()
                        .filter(|doc| doc.id != current_id)
                        .map(profile_from_doc)
                        .collect());
                }
                Ok(_) => {}
                Err(e) if e.is_unavailable() => return Err(e.into()),
                Err(e) => warn!(stage, error = %e, "user search stage failed"),
            }
        }

        Ok(Vec::new())
    }

    /// Make sure the signed-in principal has a searchable directory
    /// record. Idempotent: a record that already carries an email is left
    /// alone. First-time writes also initialise the principal's chat
    /// namespace.
    pub async fn ensure_directory_entry(&self) -> Result<()> {
        let user = self.require_user()?;

        let existing = self.store().get(paths::USERS, &user.id).await?;
        let has_email = existing
            .as_ref()
            .and_then(|body| body.str_field("email"))
            .is_some_and(|email| !email.is_empty());
        if has_email {
            return Ok(());
        }

        let email = user.email.unwrap_or_default();
        let name = user
            .display_name
            .filter(|n| !n.is_empty())
            .or_else(|| email_local_part(&email))
            .unwrap_or_else(|| "User".to_string());

        let record = to_document(&json!({
            "email": email,
            "searchableEmail": email.to_lowercase(),
            "name": name,
            "searchableName": name.to_lowercase(),
            "lastUpdated": Utc::now().timestamp_millis(),
        }))?;
        self.store().set_merge(paths::USERS, &user.id, record).await?;
        info!(user = %user.id, "directory record written");

        self.ensure_chat_namespace(&user.id).await
    }

    async fn ensure_chat_namespace(&self, user_id: &str) -> Result<()> {
        let namespace = paths::user_chats(user_id);
        let any = self
            .store()
            .query(&Query::collection(namespace.clone()).limit(1))
            .await?;
        if !any.is_empty() {
            return Ok(());
        }

        let placeholder = to_document(&json!({
            "placeholder": true,
            "created": Utc::now().timestamp_millis(),
        }))?;
        self.store().set(&namespace, paths::PLACEHOLDER_DOC, placeholder).await?;
        debug!(user = user_id, "chat namespace initialised");
        Ok(())
    }

    /// Keep the directory in step with the session: every sign-in upserts
    /// the principal's record. Runs until the auth provider goes away.
    pub async fn run_session_sync(&self) {
        let mut sessions = self.auth().session_events();
        loop {
            let signed_in = sessions.borrow_and_update().is_some();
            if signed_in {
                if let Err(e) = self.ensure_directory_entry().await {
                    warn!(error = %e, "directory sync on sign-in failed");
                }
            }
            if sessions.changed().await.is_err() {
                return;
            }
        }
    }
}

fn prefix_query(field: &str, prefix: &str) -> Query {
    Query::collection(paths::USERS)
        .filter_ge(field, prefix)
        .filter_le(field, format!("{prefix}{PREFIX_CEILING}"))
}

fn profile_from_doc(doc: StoredDocument) -> UserProfile {
    let body: &Document = &doc.body;
    let email = body.str_field("email").unwrap_or_default().to_string();
    let name = match body.str_field("name").unwrap_or(UNKNOWN_USER) {
        "" => email_local_part(&email).unwrap_or_else(|| UNKNOWN_USER.to_string()),
        name => name.to_string(),
    };
    UserProfile {
        id: doc.id,
        name,
        email,
    }
}
