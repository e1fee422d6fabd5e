use std::time::{Duration, Instant};

/// Default time a message stays visible.
pub const DEFAULT_DISPLAY: Duration = Duration::from_secs(5);

/// Transient user-visible message that expires a fixed delay after the
/// last assignment.
///
/// Expiry is evaluated on read, so no timer task is needed. Assigning a
/// new message restarts the window.
#[derive(Debug, Clone)]
pub struct Banner {
    message: Option<String>,
    updated_at: Option<Instant>,
    display: Duration,
}

impl Default for Banner {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY)
    }
}

impl Banner {
    /// Creates an empty banner with the given display window.
    pub fn new(display: Duration) -> Self {
        Self {
            message: None,
            updated_at: None,
            display,
        }
    }

    /// Returns the display window.
    pub fn display(&self) -> Duration {
        self.display
    }

    /// Shows `message`, restarting the display window at `now`.
    pub fn set(&mut self, message: impl Into<String>, now: Instant) {
        self.message = Some(message.into());
        self.updated_at = Some(now);
    }

    /// Hides the current message.
    pub fn clear(&mut self) {
        self.message = None;
        self.updated_at = None;
    }

    /// Returns the message if it is still visible at `now`.
    pub fn current_at(&self, now: Instant) -> Option<&str> {
        let updated_at = self.updated_at?;
        if now.saturating_duration_since(updated_at) >= self.display {
            return None;
        }
        self.message.as_deref()
    }

    /// Returns the message if it is still visible.
    pub fn current(&self) -> Option<&str> {
        self.current_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_expires_after_display_window() {
        let start = Instant::now();
        let mut banner = Banner::default();
        banner.set("network down", start);

        assert_eq!(banner.current_at(start + Duration::from_secs(4)), Some("network down"));
        assert_eq!(banner.current_at(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn new_message_restarts_window() {
        let start = Instant::now();
        let mut banner = Banner::default();
        banner.set("first", start);
        banner.set("second", start + Duration::from_secs(3));

        assert_eq!(
            banner.current_at(start + Duration::from_secs(7)),
            Some("second")
        );
        assert_eq!(banner.current_at(start + Duration::from_secs(8)), None);
    }

    #[test]
    fn clear_hides_immediately() {
        let start = Instant::now();
        let mut banner = Banner::new(Duration::from_secs(1));
        banner.set("oops", start);
        banner.clear();

        assert_eq!(banner.current_at(start), None);
    }
}
