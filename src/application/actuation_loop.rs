// Actuation loop - Forwards decision changes to the battery
use crate::domain::decision::{DecisionResult, Mode};
use std::time::Duration;
use tokio::sync::watch;

pub struct ActuationLoop {
    decisions: watch::Receiver<DecisionResult>,
    interval: Duration,
    dry_run: bool,
    last_sent: Option<Mode>,
    tx: watch::Sender<Option<Mode>>,
}

impl ActuationLoop {
    /// Returns the loop and a receiver holding the last mode it sent.
    pub fn new(
        decisions: watch::Receiver<DecisionResult>,
        interval: Duration,
        dry_run: bool,
    ) -> (Self, watch::Receiver<Option<Mode>>) {
        let (tx, rx) = watch::channel(None);
        let actuation_loop = Self {
            decisions,
            interval,
            dry_run,
            last_sent: None,
            tx,
        };
        (actuation_loop, rx)
    }

    pub async fn run_forever(mut self) {
        tracing::info!(dry_run = self.dry_run, "actuation_loop.start");
        loop {
            self.tick();
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Returns true when a new command was issued.
    pub fn tick(&mut self) -> bool {
        let decision = self.decisions.borrow().mode;
        if self.last_sent == Some(decision) {
            return false;
        }

        tracing::info!(
            decision = %decision,
            previous = ?self.last_sent.map(|m| m.as_str()),
            dry_run = self.dry_run,
            "actuation_loop.new_command"
        );
        if self.dry_run {
            tracing::info!(decision = %decision, "actuation_loop.dry_run_skip");
        }

        self.last_sent = Some(decision);
        self.tx.send_replace(self.last_sent);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_changes_are_sent() {
        let (decision_tx, decision_rx) = watch::channel(DecisionResult::default());
        let (mut actuation, sent) = ActuationLoop::new(decision_rx, Duration::from_secs(10), true);

        assert_eq!(*sent.borrow(), None);
        assert!(actuation.tick());
        assert_eq!(*sent.borrow(), Some(Mode::Hold));
        assert!(!actuation.tick());

        decision_tx.send_replace(DecisionResult {
            mode: Mode::Charge,
            target_w: 3000,
            reason: "cheap".to_string(),
        });
        assert!(actuation.tick());
        assert_eq!(*sent.borrow(), Some(Mode::Charge));

        // A new reason with the same mode is not a new command.
        decision_tx.send_replace(DecisionResult {
            mode: Mode::Charge,
            target_w: 3000,
            reason: "still cheap".to_string(),
        });
        assert!(!actuation.tick());
    }
}
