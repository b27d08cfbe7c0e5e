//! Top-level view selection.

use super::{Role, Session};

/// Which top-level screen the shell renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Full-screen offline notice with a manual retry
    Offline,
    /// Session check in flight
    Loading,
    Unauthenticated,
    Authenticated,
}

/// Progress of the session check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Pending,
    Resolved(Option<Session>),
}

/// Inputs the view is derived from. Connectivity and session are tracked
/// independently, so going offline never discards the session.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    online: bool,
    session: SessionState,
    role: Role,
}

impl ViewState {
    pub fn new(online: bool) -> Self {
        Self {
            online,
            ..Self::default()
        }
    }

    pub fn online(&self) -> bool {
        self.online
    }

    /// Returns whether the value changed; repeated signals are ignored.
    pub fn set_online(&mut self, online: bool) -> bool {
        let changed = self.online != online;
        self.online = online;
        changed
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn set_session(&mut self, session: SessionState) {
        self.session = session;
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn view(&self) -> View {
        if !self.online {
            return View::Offline;
        }
        match &self.session {
            SessionState::Pending => View::Loading,
            SessionState::Resolved(None) => View::Unauthenticated,
            SessionState::Resolved(Some(_)) => View::Authenticated,
        }
    }
}
