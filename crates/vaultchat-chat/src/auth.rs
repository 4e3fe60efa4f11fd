//! Session access.
//!
//! The service only ever *reads* identity state; sign-in and sign-up live
//! with the auth collaborator. `current_user` is a pure, non-blocking read
//! of the active session; `session_events` is the change stream the
//! directory sync listens on.

use std::sync::Arc;

use tokio::sync::watch;

use vaultchat_types::AuthUser;

pub trait AuthProvider: Clone + Send + Sync + 'static {
    /// The active session's user, `None` when signed out. Never blocks.
    fn current_user(&self) -> Option<AuthUser>;

    /// Watch session changes. The receiver starts at the current state.
    fn session_events(&self) -> watch::Receiver<Option<AuthUser>>;
}

/// A session held in memory. Used by embedders that manage sign-in
/// themselves, and by tests.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    inner: Arc<StaticAuthInner>,
}

#[derive(Debug)]
struct StaticAuthInner {
    tx: watch::Sender<Option<AuthUser>>,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(StaticAuthInner { tx }),
        }
    }

    pub fn signed_in(user: AuthUser) -> Self {
        let (tx, _) = watch::channel(Some(user));
        Self {
            inner: Arc::new(StaticAuthInner { tx }),
        }
    }

    pub fn sign_in(&self, user: AuthUser) {
        let _ = self.inner.tx.send(Some(user));
    }

    pub fn sign_out(&self) {
        let _ = self.inner.tx.send(None);
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.inner.tx.borrow().clone()
    }

    fn session_events(&self) -> watch::Receiver<Option<AuthUser>> {
        self.inner.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ash() -> AuthUser {
        AuthUser {
            id: "a1".into(),
            display_name: Some("Ash".into()),
            email: Some("ash@example.com".into()),
        }
    }

    #[tokio::test]
    async fn session_reads_and_events() {
        let auth = StaticAuth::signed_out();
        assert_eq!(auth.current_user(), None);

        let mut events = auth.session_events();
        auth.sign_in(ash());
        events.changed().await.unwrap();
        assert_eq!(auth.current_user().map(|u| u.id), Some("a1".to_string()));

        auth.sign_out();
        events.changed().await.unwrap();
        assert_eq!(auth.current_user(), None);
    }
}
