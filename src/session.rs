//! Persisted session state: the three values that survive a page navigation.
//!
//! Storage is plain origin-scoped key-value. Reads are forgiving: a missing
//! or malformed value falls back to its default instead of erroring, the
//! same way app settings load elsewhere would.

/// The state restored at the top of every page load.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Session {
    /// Last known playback position of the background track, in seconds.
    pub position: f64,
    /// User's mute preference.
    pub muted: bool,
    /// Whether autoplay or a gesture-unlock has ever succeeded in this
    /// browser. When true, later page loads skip straight to play.
    pub unlocked: bool,
}

/// Backing store for the persisted session.
///
/// The browser implementation writes through to localStorage; tests drive
/// the state machine against [`MemoryStore`] instead.
pub trait SessionStore {
    fn load(&self) -> Session;
    fn save_position(&mut self, seconds: f64);
    fn save_muted(&mut self, muted: bool);
    fn save_unlocked(&mut self, unlocked: bool);
}

pub fn position_key(prefix: &str) -> String {
    format!("{prefix}.position")
}

pub fn muted_key(prefix: &str) -> String {
    format!("{prefix}.muted")
}

pub fn unlocked_key(prefix: &str) -> String {
    format!("{prefix}.unlocked")
}

/// In-memory store. One instance stands in for the browser's localStorage
/// across simulated page loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStore {
    session: Session,
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Session {
        self.session
    }

    fn save_position(&mut self, seconds: f64) {
        self.session.position = seconds.max(0.0);
    }

    fn save_muted(&mut self, muted: bool) {
        self.session.muted = muted;
    }

    fn save_unlocked(&mut self, unlocked: bool) {
        self.session.unlocked = unlocked;
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStore;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{muted_key, position_key, unlocked_key, Session, SessionStore};
    use gloo_storage::{LocalStorage, Storage};

    /// localStorage-backed store. Writes are best-effort: a full or
    /// unavailable storage quota must never take playback down with it.
    pub struct BrowserStore {
        position_key: String,
        muted_key: String,
        unlocked_key: String,
    }

    impl BrowserStore {
        pub fn new(prefix: &str) -> Self {
            Self {
                position_key: position_key(prefix),
                muted_key: muted_key(prefix),
                unlocked_key: unlocked_key(prefix),
            }
        }
    }

    impl SessionStore for BrowserStore {
        fn load(&self) -> Session {
            Session {
                position: LocalStorage::get(&self.position_key).unwrap_or(0.0),
                muted: LocalStorage::get(&self.muted_key).unwrap_or(false),
                unlocked: LocalStorage::get(&self.unlocked_key).unwrap_or(false),
            }
        }

        fn save_position(&mut self, seconds: f64) {
            let _ = LocalStorage::set(&self.position_key, seconds.max(0.0));
        }

        fn save_muted(&mut self, muted: bool) {
            let _ = LocalStorage::set(&self.muted_key, muted);
        }

        fn save_unlocked(&mut self, unlocked: bool) {
            let _ = LocalStorage::set(&self.unlocked_key, unlocked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_carry_the_prefix() {
        assert_eq!(position_key("everplay"), "everplay.position");
        assert_eq!(muted_key("everplay"), "everplay.muted");
        assert_eq!(unlocked_key("site"), "site.unlocked");
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::default();
        assert_eq!(store.load(), Session::default());

        store.save_position(42.5);
        store.save_muted(true);
        store.save_unlocked(true);

        let session = store.load();
        assert_eq!(session.position, 42.5);
        assert!(session.muted);
        assert!(session.unlocked);
    }

    #[test]
    fn negative_positions_are_clamped() {
        let mut store = MemoryStore::default();
        store.save_position(-3.0);
        assert_eq!(store.load().position, 0.0);
    }
}
