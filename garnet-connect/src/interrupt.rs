//! Ctrl+C handling for the whole session.
//!
//! Once `tokio::signal::ctrl_c` is listened to, the default handler is gone
//! for the rest of the process, so a single listener decides what Ctrl+C
//! means: abandon the login in flight, or exit when idle.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// Exit code for a process ended by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Tracks whether a login is running.
#[derive(Debug, Clone, Default)]
pub struct LoginInterrupt {
    logins: Arc<AtomicUsize>,
}

impl LoginInterrupt {
    /// Listens for Ctrl+C until the process ends. While a login is running
    /// `cancel` is called, otherwise the process exits.
    pub fn install(cancel: impl Fn() + Send + 'static) -> Self {
        let interrupt = Self::default();
        let watched = interrupt.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if watched.is_busy() {
                    log::info!("Login cancelled from the terminal");
                    cancel();
                } else {
                    log::info!("Interrupted, exiting");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
            log::warn!("Ctrl+C listener stopped");
        });
        interrupt
    }

    /// Marks a login as running until the guard is dropped.
    pub fn begin(&self) -> LoginGuard {
        self.logins.fetch_add(1, Ordering::SeqCst);
        LoginGuard {
            logins: self.logins.clone(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.logins.load(Ordering::SeqCst) > 0
    }
}

#[must_use]
pub struct LoginGuard {
    logins: Arc<AtomicUsize>,
}

impl Drop for LoginGuard {
    fn drop(&mut self) {
        self.logins.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_only_while_a_guard_lives() {
        let interrupt = LoginInterrupt::default();
        assert!(!interrupt.is_busy());

        let guard = interrupt.begin();
        assert!(interrupt.clone().is_busy());

        drop(guard);
        assert!(!interrupt.is_busy());
    }

    #[test]
    fn overlapping_logins_keep_it_busy() {
        let interrupt = LoginInterrupt::default();
        let first = interrupt.begin();
        let second = interrupt.begin();

        drop(first);
        assert!(interrupt.is_busy());
        drop(second);
        assert!(!interrupt.is_busy());
    }
}
