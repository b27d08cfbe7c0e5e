//! Install invitation lifecycle.
//!
//! Two paths lead to an invitation: the platform's deferred install signal
//! (native) or an iOS browser that is not already running standalone
//! (manual instructions, since iOS never emits the signal).

use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The user's answer to a native install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// Platform capability behind a deferred install signal.
///
/// `prompt` consumes the handle, so it can be shown at most once.
pub trait NativeInstallPrompt: Send {
    /// Keep the platform from showing its own install UI.
    fn prevent_default(&mut self);

    /// Show the native prompt; the returned future resolves with the user's choice.
    fn prompt(self: Box<Self>) -> BoxFuture<'static, InstallOutcome>;
}

/// Owned, single-use install signal retained for later.
pub struct DeferredPrompt(Box<dyn NativeInstallPrompt>);

impl DeferredPrompt {
    pub fn new(prompt: impl NativeInstallPrompt + 'static) -> Self {
        Self(Box::new(prompt))
    }

    fn prevent_default(&mut self) {
        self.0.prevent_default();
    }

    async fn prompt(self) -> InstallOutcome {
        self.0.prompt().await
    }
}

impl fmt::Debug for DeferredPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredPrompt")
    }
}

/// Device facts detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Platform {
    pub is_ios: bool,
    pub is_standalone: bool,
}

impl Platform {
    pub fn detect(user_agent: &str, is_standalone: bool) -> Self {
        let ua = user_agent.to_lowercase();
        let is_ios = ["iphone", "ipad", "ipod"].iter().any(|d| ua.contains(d));
        Self {
            is_ios,
            is_standalone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOffer {
    NotOffered,
    /// Backed by a retained platform signal
    Native,
    /// iOS: show how-to-install instructions
    Manual,
}

#[derive(Debug)]
pub struct InstallPrompt {
    platform: Platform,
    offer: InstallOffer,
    deferred: Option<DeferredPrompt>,
    visible: bool,
    dismissed: bool,
    instructions_visible: bool,
    installed: bool,
}

impl InstallPrompt {
    pub fn new(platform: Platform) -> Self {
        let manual = platform.is_ios && !platform.is_standalone;
        Self {
            platform,
            offer: if manual {
                InstallOffer::Manual
            } else {
                InstallOffer::NotOffered
            },
            deferred: None,
            visible: manual,
            dismissed: false,
            instructions_visible: false,
            installed: platform.is_standalone,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn offer(&self) -> InstallOffer {
        self.offer
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn instructions_visible(&self) -> bool {
        self.instructions_visible
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// The platform reported the app as installable.
    ///
    /// Any previously retained signal is replaced.
    pub fn on_installable(&mut self, mut prompt: DeferredPrompt) {
        prompt.prevent_default();
        if self.installed {
            debug!("Ignoring install signal, already installed");
            return;
        }
        if self.dismissed {
            debug!("Ignoring install signal, invitation dismissed this session");
            return;
        }
        self.deferred = Some(prompt);
        self.offer = InstallOffer::Native;
        self.visible = true;
    }

    /// Act on the invitation.
    ///
    /// With a retained native signal this shows the prompt and returns the
    /// outcome; the signal is discarded either way. On iOS it toggles the
    /// instructions instead and returns `None`. Does nothing once dismissed.
    pub async fn accept(&mut self) -> Option<InstallOutcome> {
        if self.dismissed {
            debug!("Ignoring install request, invitation dismissed this session");
            return None;
        }
        match self.deferred.take() {
            Some(prompt) => {
                let outcome = prompt.prompt().await;
                info!(?outcome, "Install prompt answered");
                if outcome == InstallOutcome::Accepted {
                    self.visible = false;
                }
                Some(outcome)
            }
            None => {
                if self.offer == InstallOffer::Manual {
                    self.instructions_visible = !self.instructions_visible;
                }
                None
            }
        }
    }

    /// Hide the invitation for the rest of the session.
    pub fn dismiss(&mut self) {
        self.visible = false;
        self.dismissed = true;
        self.instructions_visible = false;
        self.deferred = None;
    }

    /// The app was installed through any path; nothing left to offer.
    pub fn on_installed(&mut self) {
        self.installed = true;
        self.visible = false;
        self.instructions_visible = false;
        self.deferred = None;
        self.offer = InstallOffer::NotOffered;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Install signal double that counts prompts.
    pub(crate) struct CountingPrompt {
        pub prompts: Arc<AtomicUsize>,
        pub prevented: Arc<AtomicBool>,
        pub outcome: InstallOutcome,
    }

    impl CountingPrompt {
        pub(crate) fn deferred(
            outcome: InstallOutcome,
        ) -> (DeferredPrompt, Arc<AtomicUsize>, Arc<AtomicBool>) {
            let prompts = Arc::new(AtomicUsize::new(0));
            let prevented = Arc::new(AtomicBool::new(false));
            let prompt = DeferredPrompt::new(CountingPrompt {
                prompts: prompts.clone(),
                prevented: prevented.clone(),
                outcome,
            });
            (prompt, prompts, prevented)
        }
    }

    impl NativeInstallPrompt for CountingPrompt {
        fn prevent_default(&mut self) {
            self.prevented.store(true, Ordering::SeqCst);
        }

        fn prompt(self: Box<Self>) -> BoxFuture<'static, InstallOutcome> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcome;
            Box::pin(async move { outcome })
        }
    }

    const IPHONE_UA: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
    const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) Chrome/120.0";

    #[test]
    fn test_detect_platform() {
        assert!(Platform::detect(IPHONE_UA, false).is_ios);
        assert!(Platform::detect("Mozilla/5.0 (iPad; CPU OS 16_0)", false).is_ios);
        assert!(!Platform::detect(ANDROID_UA, false).is_ios);
    }

    #[test]
    fn test_ios_shows_manual_invitation() {
        let prompt = InstallPrompt::new(Platform::detect(IPHONE_UA, false));
        assert_eq!(prompt.offer(), InstallOffer::Manual);
        assert!(prompt.is_visible());
    }

    #[test]
    fn test_standalone_never_invites() {
        let mut prompt = InstallPrompt::new(Platform::detect(IPHONE_UA, true));
        assert!(!prompt.is_visible());

        let (signal, _, prevented) = CountingPrompt::deferred(InstallOutcome::Accepted);
        prompt.on_installable(signal);
        assert!(prevented.load(Ordering::SeqCst));
        assert!(!prompt.is_visible());
        assert!(!prompt.has_deferred());
    }

    #[test]
    fn test_native_signal_shows_invitation() {
        let mut prompt = InstallPrompt::new(Platform::detect(ANDROID_UA, false));
        assert!(!prompt.is_visible());

        let (signal, prompts, prevented) = CountingPrompt::deferred(InstallOutcome::Accepted);
        prompt.on_installable(signal);

        assert!(prevented.load(Ordering::SeqCst));
        assert!(prompt.is_visible());
        assert_eq!(prompt.offer(), InstallOffer::Native);
        assert_eq!(prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_accepted_prompt_hides_and_is_single_use() {
        let mut prompt = InstallPrompt::new(Platform::default());
        let (signal, prompts, _) = CountingPrompt::deferred(InstallOutcome::Accepted);
        prompt.on_installable(signal);

        assert_eq!(prompt.accept().await, Some(InstallOutcome::Accepted));
        assert!(!prompt.is_visible());
        assert_eq!(prompt.accept().await, None);
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dismissed_outcome_discards_signal() {
        let mut prompt = InstallPrompt::new(Platform::default());
        let (signal, prompts, _) = CountingPrompt::deferred(InstallOutcome::Dismissed);
        prompt.on_installable(signal);

        assert_eq!(prompt.accept().await, Some(InstallOutcome::Dismissed));
        assert!(prompt.is_visible());
        assert_eq!(prompt.accept().await, None);
        assert_eq!(prompts.load(Ordering::SeqCst), 1);

        // A fresh signal re-arms the invitation
        let (signal, fresh_prompts, _) = CountingPrompt::deferred(InstallOutcome::Accepted);
        prompt.on_installable(signal);
        assert_eq!(prompt.accept().await, Some(InstallOutcome::Accepted));
        assert_eq!(fresh_prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dismissing_invitation_drops_signal() {
        let mut prompt = InstallPrompt::new(Platform::default());
        let (signal, prompts, _) = CountingPrompt::deferred(InstallOutcome::Accepted);
        prompt.on_installable(signal);

        prompt.dismiss();
        assert!(!prompt.is_visible());
        assert_eq!(prompt.accept().await, None);
        assert_eq!(prompts.load(Ordering::SeqCst), 0);

        // Stays hidden for the session even if the platform signals again
        let (signal, _, _) = CountingPrompt::deferred(InstallOutcome::Accepted);
        prompt.on_installable(signal);
        assert!(!prompt.is_visible());
        assert!(!prompt.has_deferred());
    }

    #[tokio::test]
    async fn test_ios_accept_toggles_instructions() {
        let mut prompt = InstallPrompt::new(Platform::detect(IPHONE_UA, false));

        assert_eq!(prompt.accept().await, None);
        assert!(prompt.instructions_visible());
        assert_eq!(prompt.accept().await, None);
        assert!(!prompt.instructions_visible());
    }

    #[tokio::test]
    async fn test_ios_dismissal_keeps_instructions_hidden() {
        let mut prompt = InstallPrompt::new(Platform::detect(IPHONE_UA, false));
        prompt.accept().await;
        assert!(prompt.instructions_visible());

        prompt.dismiss();
        assert!(!prompt.is_visible());
        assert!(!prompt.instructions_visible());

        assert_eq!(prompt.accept().await, None);
        assert!(!prompt.instructions_visible());
    }

    #[test]
    fn test_installed_clears_everything() {
        let mut prompt = InstallPrompt::new(Platform::default());
        let (signal, _, _) = CountingPrompt::deferred(InstallOutcome::Accepted);
        prompt.on_installable(signal);

        prompt.on_installed();
        assert!(!prompt.is_visible());
        assert!(!prompt.has_deferred());
        assert_eq!(prompt.offer(), InstallOffer::NotOffered);
    }
}
