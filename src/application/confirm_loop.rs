// Confirm loop - Periodically reports the mode the battery should be in
use crate::domain::decision::Mode;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;

pub struct ConfirmLoop {
    sent: watch::Receiver<Option<Mode>>,
    interval: Duration,
}

impl ConfirmLoop {
    pub fn new(sent: watch::Receiver<Option<Mode>>, interval: Duration) -> Self {
        Self { sent, interval }
    }

    pub async fn run_forever(self) {
        tracing::info!(interval_sec = self.interval.as_secs(), "confirm_loop.start");
        loop {
            self.tick();
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Mode last sent by the actuation loop, if any
    pub fn tick(&self) -> Option<Mode> {
        let expected = *self.sent.borrow();
        tracing::info!(
            ts = %Utc::now().to_rfc3339(),
            expected = ?expected.map(|m| m.as_str()),
            "confirm_loop.tick"
        );
        expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_reports_last_sent_mode() {
        let (tx, rx) = watch::channel(None);
        let confirm = ConfirmLoop::new(rx, Duration::from_secs(60));
        assert_eq!(confirm.tick(), None);

        tx.send_replace(Some(Mode::Discharge));
        assert_eq!(confirm.tick(), Some(Mode::Discharge));
    }
}
