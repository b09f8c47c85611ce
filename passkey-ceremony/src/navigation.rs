use std::sync::Mutex;

/// Moves the page elsewhere once a ceremony succeeds.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait Navigator {
    /// Replace the current location with `uri`, without adding a history entry.
    fn replace(&self, uri: &str);
}

/// A [`Navigator`] for hosts that have no location to replace. Redirects are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNavigation;

impl Navigator for NoNavigation {
    fn replace(&self, uri: &str) {
        log::info!("not navigating to {uri}: host has no location");
    }
}

/// A [`Navigator`] that remembers where it was sent. The last replacement wins.
#[derive(Debug, Default)]
pub struct LocationHistory {
    current: Mutex<Option<String>>,
}

impl LocationHistory {
    /// A history that has not navigated yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The location most recently replaced to, if any.
    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Navigator for LocationHistory {
    fn replace(&self, uri: &str) {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(uri.to_owned());
    }
}
