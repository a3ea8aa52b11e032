//! The cooperative cancellation signal shared by the poll loop and the
//! control socket listener (§5).
//!
//! A plain `crossbeam_channel` message is consumed by whichever suspension
//! point happens to call `recv`/`try_recv` first; with the control listener
//! and the poll loop's own idle-sleep both drawing from the same receiver,
//! a single `shutdown` request can be swallowed by the sleep's `recv` and
//! never observed by the loop's own `is_shutting_down` check afterward. The
//! durable state lives in an `AtomicBool` instead — every suspension point
//! reads it directly, so it does not matter who else has looked at it or how
//! many times. The channel survives only as a doorbell to wake a blocked
//! sleep immediately; losing a wake message is harmless because the next
//! `is_shutting_down` poll (or the timeout itself) still sees the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The writer's half: set by whoever decides the daemon should stop (the
/// control listener on a `shutdown` request).
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake_tx: crossbeam_channel::Sender<()>,
}

impl ShutdownHandle {
    /// Mark shutdown requested and wake any sleeper. Idempotent — calling
    /// this more than once has no additional effect.
    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.send(());
    }
}

/// The reader's half: held by every suspension point that must observe
/// shutdown (§5).
#[derive(Clone)]
pub struct ShutdownListener {
    flag: Arc<AtomicBool>,
    wake_rx: crossbeam_channel::Receiver<()>,
}

impl ShutdownListener {
    pub fn is_shutting_down(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `dur`, waking early if shutdown is signaled. Never blocks
    /// uninterruptibly (§5, §9).
    pub fn interruptible_sleep(&self, dur: Duration) {
        if self.is_shutting_down() {
            return;
        }
        let _ = crossbeam_channel::select! {
            recv(self.wake_rx) -> _ => {}
            default(dur) => {}
        };
    }
}

/// Build a fresh handle/listener pair sharing one shutdown flag.
pub fn channel() -> (ShutdownHandle, ShutdownListener) {
    let flag = Arc::new(AtomicBool::new(false));
    let (wake_tx, wake_rx) = crossbeam_channel::unbounded();
    (ShutdownHandle { flag: flag.clone(), wake_tx }, ShutdownListener { flag, wake_rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_durable_across_repeated_observers() {
        let (handle, listener) = channel();
        handle.signal();
        // Every suspension point reads the same flag; none of them consume
        // it, so repeated checks and an interruptible sleep afterward all
        // still see shutdown requested.
        assert!(listener.is_shutting_down());
        listener.interruptible_sleep(Duration::from_secs(30));
        assert!(listener.is_shutting_down());
        assert!(listener.is_shutting_down());
    }

    #[test]
    fn interruptible_sleep_wakes_promptly_on_signal() {
        let (handle, listener) = channel();
        let listener2 = listener.clone();
        let start = std::time::Instant::now();
        let t = std::thread::spawn(move || listener2.interruptible_sleep(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(20));
        handle.signal();
        t.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn no_signal_sleeps_the_full_duration() {
        let (_handle, listener) = channel();
        let start = std::time::Instant::now();
        listener.interruptible_sleep(Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!listener.is_shutting_down());
    }
}
