//! Connectivity-aware application shell.
//!
//! `AppShell` consumes platform signals and user actions, keeps the view
//! inputs and install invitation current, and publishes a `ShellSnapshot`
//! through a watch channel after every change.

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use super::install::{DeferredPrompt, InstallOutcome, InstallPrompt, Platform};
use super::view::{SessionState, View, ViewState};
use super::{Role, Session, SessionProvider};

/// Reports whether the device currently has network access.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

impl<F> ConnectivityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_online(&self) -> bool {
        self()
    }
}

/// Ambient signals from the platform.
#[derive(Debug)]
pub enum PlatformSignal {
    Online,
    Offline,
    Installable(DeferredPrompt),
    AppInstalled,
    SessionChanged(Option<Session>),
}

/// Everything the shell reacts to.
#[derive(Debug)]
pub enum ShellEvent {
    Platform(PlatformSignal),
    AcceptInstall,
    DismissInstall,
    /// Manual retry from the offline screen
    Retry,
}

impl From<PlatformSignal> for ShellEvent {
    fn from(signal: PlatformSignal) -> Self {
        ShellEvent::Platform(signal)
    }
}

/// What the renderer needs to draw the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellSnapshot {
    pub view: View,
    pub role: Role,
    pub install_visible: bool,
    pub install_is_ios: bool,
    pub install_instructions_visible: bool,
}

pub struct AppShell<P> {
    sessions: P,
    probe: Box<dyn ConnectivityProbe>,
    state: ViewState,
    install: InstallPrompt,
    /// Set when a session check was skipped because the device was offline
    session_check_skipped: bool,
    /// Set when a new session's role could not be looked up while offline
    role_check_skipped: bool,
    snapshot_tx: watch::Sender<ShellSnapshot>,
}

impl<P: SessionProvider> AppShell<P> {
    pub fn new(sessions: P, probe: impl ConnectivityProbe + 'static, platform: Platform) -> Self {
        let state = ViewState::new(probe.is_online());
        let install = InstallPrompt::new(platform);
        let (snapshot_tx, _) = watch::channel(Self::snapshot_of(&state, &install));
        Self {
            sessions,
            probe: Box::new(probe),
            state,
            install,
            session_check_skipped: false,
            role_check_skipped: false,
            snapshot_tx,
        }
    }

    fn snapshot_of(state: &ViewState, install: &InstallPrompt) -> ShellSnapshot {
        ShellSnapshot {
            view: state.view(),
            role: state.role(),
            install_visible: install.is_visible(),
            install_is_ios: install.platform().is_ios,
            install_instructions_visible: install.instructions_visible(),
        }
    }

    pub fn snapshot(&self) -> ShellSnapshot {
        Self::snapshot_of(&self.state, &self.install)
    }

    pub fn view(&self) -> View {
        self.state.view()
    }

    pub fn is_admin(&self) -> bool {
        self.state.is_admin()
    }

    pub fn install_prompt(&self) -> &InstallPrompt {
        &self.install
    }

    pub fn subscribe(&self) -> watch::Receiver<ShellSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Startup: run the initial session check.
    pub async fn start(&mut self) {
        self.check_session().await;
    }

    /// Process events until the sender side closes.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ShellEvent>) {
        self.start().await;
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Shell event channel closed");
    }

    pub async fn handle_event(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::Platform(signal) => self.handle_signal(signal).await,
            ShellEvent::AcceptInstall => {
                self.accept_install().await;
            }
            ShellEvent::DismissInstall => self.dismiss_install(),
            ShellEvent::Retry => self.retry().await,
        }
    }

    pub async fn handle_signal(&mut self, signal: PlatformSignal) {
        match signal {
            PlatformSignal::Online => self.set_online(true).await,
            PlatformSignal::Offline => self.set_online(false).await,
            PlatformSignal::Installable(prompt) => {
                self.install.on_installable(prompt);
                self.publish();
            }
            PlatformSignal::AppInstalled => {
                self.install.on_installed();
                self.publish();
            }
            PlatformSignal::SessionChanged(session) => self.on_session_changed(session).await,
        }
    }

    async fn set_online(&mut self, online: bool) {
        if !self.state.set_online(online) {
            return;
        }
        info!(online, "Connectivity changed");
        self.publish();

        if !online {
            return;
        }
        if self.session_check_skipped {
            self.state.set_session(SessionState::Pending);
            self.publish();
            self.check_session().await;
        } else if self.role_check_skipped {
            self.recheck_role().await;
        }
    }

    /// Re-evaluate connectivity from the probe.
    pub async fn retry(&mut self) {
        let online = self.probe.is_online();
        debug!(online, "Retrying connectivity");
        self.set_online(online).await;
    }

    /// Resolve the current session and the user's role.
    ///
    /// Skipped while offline so an unreachable backend never holds the
    /// shell in `Loading`; the check re-runs once connectivity returns.
    pub async fn check_session(&mut self) {
        if !self.state.online() {
            debug!("Offline, skipping session check");
            self.session_check_skipped = true;
            self.state.set_session(SessionState::Resolved(None));
            self.publish();
            return;
        }
        self.session_check_skipped = false;
        self.role_check_skipped = false;

        let session = match self.sessions.current_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Error checking session");
                None
            }
        };

        let role = match &session {
            Some(s) => self.check_role(s).await,
            None => Role::Member,
        };
        self.state.set_role(role);
        self.state.set_session(SessionState::Resolved(session));
        self.publish();
    }

    async fn on_session_changed(&mut self, session: Option<Session>) {
        self.state.set_role(Role::Member);
        self.state.set_session(SessionState::Resolved(session.clone()));
        self.role_check_skipped = false;
        self.publish();

        if let Some(s) = session {
            if !self.state.online() {
                debug!(user_id = %s.user_id, "Offline, deferring role check");
                self.role_check_skipped = true;
                return;
            }
            let role = self.check_role(&s).await;
            self.state.set_role(role);
            self.publish();
        }
    }

    /// Look up the role of the current session after a deferred check.
    async fn recheck_role(&mut self) {
        self.role_check_skipped = false;
        let session = match self.state.session() {
            SessionState::Resolved(Some(s)) => s.clone(),
            _ => return,
        };
        let role = self.check_role(&session).await;
        self.state.set_role(role);
        self.publish();
    }

    /// Look up the user's role; any failure falls back to least privilege.
    async fn check_role(&self, session: &Session) -> Role {
        if !self.state.online() {
            return Role::Member;
        }
        match self.sessions.fetch_role(&session.user_id).await {
            Ok(role) => role,
            Err(e) => {
                error!(user_id = %session.user_id, error = %e, "Error checking role");
                Role::Member
            }
        }
    }

    pub async fn accept_install(&mut self) -> Option<InstallOutcome> {
        let outcome = self.install.accept().await;
        self.publish();
        outcome
    }

    pub fn dismiss_install(&mut self) {
        self.install.dismiss();
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::gate::install::tests::CountingPrompt;

    #[derive(Default)]
    struct ScriptedSessions {
        session: Option<Session>,
        role: Option<Role>,
        fail_session: bool,
        session_checks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionProvider for ScriptedSessions {
        async fn current_session(&self) -> anyhow::Result<Option<Session>> {
            self.session_checks.fetch_add(1, Ordering::SeqCst);
            if self.fail_session {
                anyhow::bail!("backend unreachable");
            }
            Ok(self.session.clone())
        }

        async fn fetch_role(&self, _user_id: &str) -> anyhow::Result<Role> {
            self.role
                .ok_or_else(|| anyhow::anyhow!("profile not found"))
        }
    }

    fn signed_in(role: Option<Role>) -> ScriptedSessions {
        ScriptedSessions {
            session: Some(Session::new("user-1")),
            role,
            ..ScriptedSessions::default()
        }
    }

    fn probe(online: bool) -> (Arc<AtomicBool>, impl ConnectivityProbe + 'static) {
        let flag = Arc::new(AtomicBool::new(online));
        let reader = flag.clone();
        (flag, move || reader.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_loading_until_session_check() {
        let (_, online) = probe(true);
        let mut shell = AppShell::new(signed_in(Some(Role::Admin)), online, Platform::default());
        assert_eq!(shell.view(), View::Loading);

        shell.start().await;
        assert_eq!(shell.view(), View::Authenticated);
        assert!(shell.is_admin());
    }

    #[tokio::test]
    async fn test_offline_preempts_and_restores_each_state() {
        // Loading: session check not started yet
        let (_, online) = probe(true);
        let mut loading = AppShell::new(ScriptedSessions::default(), online, Platform::default());
        loading.handle_signal(PlatformSignal::Offline).await;
        assert_eq!(loading.view(), View::Offline);
        loading.handle_signal(PlatformSignal::Online).await;
        assert_eq!(loading.view(), View::Loading);

        // Unauthenticated
        let (_, online) = probe(true);
        let mut anon = AppShell::new(ScriptedSessions::default(), online, Platform::default());
        anon.start().await;
        anon.handle_signal(PlatformSignal::Offline).await;
        assert_eq!(anon.view(), View::Offline);
        anon.handle_signal(PlatformSignal::Online).await;
        assert_eq!(anon.view(), View::Unauthenticated);

        // Authenticated session survives the outage
        let (_, online) = probe(true);
        let mut authed = AppShell::new(signed_in(Some(Role::Admin)), online, Platform::default());
        authed.start().await;
        authed.handle_signal(PlatformSignal::Offline).await;
        assert_eq!(authed.view(), View::Offline);
        authed.handle_signal(PlatformSignal::Online).await;
        assert_eq!(authed.view(), View::Authenticated);
        assert!(authed.is_admin());
    }

    #[tokio::test]
    async fn test_offline_start_skips_session_check_until_reconnect() {
        let sessions = signed_in(Some(Role::Member));
        let checks = sessions.session_checks.clone();
        let (flag, online) = probe(false);
        let mut shell = AppShell::new(sessions, online, Platform::default());

        shell.start().await;
        assert_eq!(shell.view(), View::Offline);
        assert_eq!(checks.load(Ordering::SeqCst), 0);

        // Retry while still offline changes nothing
        shell.handle_event(ShellEvent::Retry).await;
        assert_eq!(shell.view(), View::Offline);

        flag.store(true, Ordering::SeqCst);
        shell.handle_event(ShellEvent::Retry).await;
        assert_eq!(shell.view(), View::Authenticated);
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sign_in_while_offline_rechecks_role_on_reconnect() {
        let (_, online) = probe(true);
        let mut shell = AppShell::new(
            ScriptedSessions {
                role: Some(Role::Admin),
                ..ScriptedSessions::default()
            },
            online,
            Platform::default(),
        );
        shell.start().await;
        assert_eq!(shell.view(), View::Unauthenticated);

        shell.handle_signal(PlatformSignal::Offline).await;
        shell
            .handle_signal(PlatformSignal::SessionChanged(Some(Session::new("admin-1"))))
            .await;
        assert_eq!(shell.view(), View::Offline);
        assert!(!shell.is_admin());

        shell.handle_signal(PlatformSignal::Online).await;
        assert_eq!(shell.view(), View::Authenticated);
        assert!(shell.is_admin());
    }

    #[tokio::test]
    async fn test_sign_out_while_offline_cancels_deferred_role_check() {
        let (_, online) = probe(true);
        let mut shell = AppShell::new(
            ScriptedSessions {
                role: Some(Role::Admin),
                ..ScriptedSessions::default()
            },
            online,
            Platform::default(),
        );
        shell.start().await;

        shell.handle_signal(PlatformSignal::Offline).await;
        shell
            .handle_signal(PlatformSignal::SessionChanged(Some(Session::new("admin-1"))))
            .await;
        shell.handle_signal(PlatformSignal::SessionChanged(None)).await;
        shell.handle_signal(PlatformSignal::Online).await;

        assert_eq!(shell.view(), View::Unauthenticated);
        assert!(!shell.is_admin());
    }

    #[tokio::test]
    async fn test_session_errors_degrade_to_least_privilege() {
        let (_, online) = probe(true);
        let mut no_role = AppShell::new(signed_in(None), online, Platform::default());
        no_role.start().await;
        assert_eq!(no_role.view(), View::Authenticated);
        assert!(!no_role.is_admin());

        let (_, online) = probe(true);
        let failing = ScriptedSessions {
            fail_session: true,
            ..ScriptedSessions::default()
        };
        let mut shell = AppShell::new(failing, online, Platform::default());
        shell.start().await;
        assert_eq!(shell.view(), View::Unauthenticated);
    }

    #[tokio::test]
    async fn test_session_changes() {
        let (_, online) = probe(true);
        let mut shell = AppShell::new(
            ScriptedSessions {
                role: Some(Role::Admin),
                ..ScriptedSessions::default()
            },
            online,
            Platform::default(),
        );
        shell.start().await;
        assert_eq!(shell.view(), View::Unauthenticated);

        shell
            .handle_signal(PlatformSignal::SessionChanged(Some(Session::new("u2"))))
            .await;
        assert_eq!(shell.view(), View::Authenticated);
        assert!(shell.is_admin());

        shell.handle_signal(PlatformSignal::SessionChanged(None)).await;
        assert_eq!(shell.view(), View::Unauthenticated);
        assert!(!shell.is_admin());
    }

    #[tokio::test]
    async fn test_install_signal_is_single_use() {
        let (_, online) = probe(true);
        let mut shell = AppShell::new(ScriptedSessions::default(), online, Platform::default());
        let (signal, prompts, _) = CountingPrompt::deferred(InstallOutcome::Dismissed);

        shell.handle_signal(PlatformSignal::Installable(signal)).await;
        assert!(shell.snapshot().install_visible);

        assert_eq!(shell.accept_install().await, Some(InstallOutcome::Dismissed));
        assert_eq!(shell.accept_install().await, None);
        assert_eq!(prompts.load(Ordering::SeqCst), 1);

        let (signal, next_prompts, _) = CountingPrompt::deferred(InstallOutcome::Accepted);
        shell.handle_signal(PlatformSignal::Installable(signal)).await;
        assert_eq!(shell.accept_install().await, Some(InstallOutcome::Accepted));
        assert_eq!(next_prompts.load(Ordering::SeqCst), 1);
        assert!(!shell.snapshot().install_visible);
    }

    #[tokio::test]
    async fn test_run_publishes_snapshots() {
        let (_, online) = probe(true);
        let mut shell = AppShell::new(signed_in(Some(Role::Member)), online, Platform::default());
        let snapshots = shell.subscribe();
        let (tx, rx) = mpsc::channel::<ShellEvent>(8);

        tx.send(PlatformSignal::Offline.into()).await.unwrap();
        tx.send(ShellEvent::DismissInstall).await.unwrap();
        drop(tx);
        shell.run(rx).await;

        let last = *snapshots.borrow();
        assert_eq!(last.view, View::Offline);
        assert!(!last.install_visible);
    }

    #[tokio::test]
    async fn test_app_installed_hides_ios_invitation() {
        let (_, online) = probe(true);
        let platform = Platform::detect("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)", false);
        let mut shell = AppShell::new(ScriptedSessions::default(), online, platform);
        assert!(shell.snapshot().install_visible);
        assert!(shell.snapshot().install_is_ios);

        shell.handle_event(ShellEvent::AcceptInstall).await;
        assert!(shell.snapshot().install_instructions_visible);

        shell.handle_signal(PlatformSignal::AppInstalled).await;
        assert!(!shell.snapshot().install_visible);
        assert!(!shell.install_prompt().has_deferred());
    }
}
