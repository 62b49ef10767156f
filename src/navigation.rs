//! Page navigation seam.
//!
//! The flow and the retry wrapper never touch a window or a router directly;
//! they hand a path to a [`Navigator`] supplied by the embedding application.

use parking_lot::Mutex;
use tracing::info;

pub trait Navigator: Send + Sync {
    /// Client-side navigation to `path`.
    fn navigate(&self, path: &str);

    /// Full-page navigation that discards in-memory state.
    fn force_navigate(&self, path: &str);
}

/// One navigation request, as seen by a [`RecordingNavigator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Soft(String),
    Forced(String),
}

/// Navigator that only remembers what it was asked to do.
///
/// Used by the CLI, which has no page to move, and by tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn history(&self) -> Vec<Navigation> {
        self.history.lock().clone()
    }

    /// Most recent navigation, if any.
    #[must_use]
    pub fn last(&self) -> Option<Navigation> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        info!(path, "navigate");
        self.history.lock().push(Navigation::Soft(path.to_string()));
    }

    fn force_navigate(&self, path: &str) {
        info!(path, "force navigate");
        self.history.lock().push(Navigation::Forced(path.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let navigator = RecordingNavigator::new();
        navigator.navigate("/proprietaire");
        navigator.force_navigate("/connexion?expired=1");

        assert_eq!(
            navigator.history(),
            vec![
                Navigation::Soft("/proprietaire".to_string()),
                Navigation::Forced("/connexion?expired=1".to_string()),
            ]
        );
        assert_eq!(
            navigator.last(),
            Some(Navigation::Forced("/connexion?expired=1".to_string()))
        );
    }
}
