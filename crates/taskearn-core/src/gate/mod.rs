//! Connectivity gate for the application shell.
//!
//! This module decides which top-level view is shown, based on live
//! connectivity and session signals rather than one-time checks, and manages
//! the install invitation:
//!
//! - `AppShell`: applies `ShellEvent`s and publishes `ShellSnapshot`s
//! - `ViewState`/`View`: offline preempts every other view
//! - `InstallPrompt`: native deferred prompt or manual iOS instructions
//! - `SessionProvider`: the external authentication backend

pub mod install;
pub mod session;
pub mod shell;
pub mod view;

pub use install::{
    DeferredPrompt, InstallOffer, InstallOutcome, InstallPrompt, NativeInstallPrompt, Platform,
};
pub use session::{Role, Session, SessionProvider};
pub use shell::{AppShell, ConnectivityProbe, PlatformSignal, ShellEvent, ShellSnapshot};
pub use view::{SessionState, View, ViewState};
