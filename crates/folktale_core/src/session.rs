//! crates/folktale_core/src/session.rs
//!
//! A local `SessionProvider` for clients that manage their own sign-in state.

use tokio::sync::watch;

use crate::domain::User;
use crate::ports::SessionProvider;

/// Holds the signed-in user in a watch channel so subscribers see every transition.
pub struct LocalSession {
    tx: watch::Sender<Option<User>>,
}

impl LocalSession {
    pub fn new(user: Option<User>) -> Self {
        let (tx, _rx) = watch::channel(user);
        Self { tx }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn sign_in(&self, user: User) {
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl SessionProvider for LocalSession {
    fn current_user(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }
}
