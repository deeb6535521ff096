use crate::TRANSFER_PROGRESS_TICK;
use std::future::Future;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};

pub const PROGRESS_MAX: u8 = 10;

/// Cosmetic counter shown while a swap is being submitted.
///
/// Cycles `1..=10` every tick during submission and rests at `10` otherwise.
/// It has no bearing on the state machine.
#[derive(Debug)]
pub struct TransferProgress {
    value: watch::Sender<u8>,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress {
    pub fn new() -> Self {
        let (value, _) = watch::channel(PROGRESS_MAX);
        Self { value }
    }

    pub fn value(&self) -> u8 {
        *self.value.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.value.subscribe()
    }

    pub fn tick(&self) {
        self.value.send_modify(|value| *value = next_value(*value));
    }

    pub fn reset(&self) {
        self.value.send_replace(PROGRESS_MAX);
    }

    /// Drives `work` to completion, ticking meanwhile.
    pub async fn track<F: Future>(&self, work: F) -> F::Output {
        let _reset = scopeguard::guard((), |_| self.reset());
        let mut ticks = interval_at(
            Instant::now() + TRANSFER_PROGRESS_TICK,
            TRANSFER_PROGRESS_TICK,
        );
        tokio::pin!(work);
        loop {
            tokio::select! {
                biased;
                output = &mut work => return output,
                _ = ticks.tick() => self.tick(),
            }
        }
    }
}

fn next_value(value: u8) -> u8 {
    if value < PROGRESS_MAX {
        value + 1
    } else {
        1
    }
}
