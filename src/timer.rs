//! One-shot deferred actions on the tokio runtime.
use log::debug;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Schedules closures to run once after a delay and keeps their handles so
/// anything still pending can be cancelled at shutdown.
pub struct Timers {
    handle: Handle,
    pending: Vec<(&'static str, JoinHandle<()>)>,
}

impl Timers {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            pending: Vec::new(),
        }
    }

    pub fn schedule<F>(&mut self, name: &'static str, after: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.reap();

        let task = self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            action();
        });

        debug!("Scheduled {} in {:.2}s", name, after.as_secs_f64());
        self.pending.push((name, task));
    }

    /// Number of actions that have not fired yet.
    pub fn pending(&mut self) -> usize {
        self.reap();
        self.pending.len()
    }

    /// Abort every action that has not fired yet.
    pub fn cancel_all(&mut self) -> usize {
        self.reap();
        let cancelled = self.pending.len();

        for (name, task) in self.pending.drain(..) {
            debug!("Cancelling pending {}", name);
            task.abort();
        }

        cancelled
    }

    fn reap(&mut self) {
        self.pending.retain(|(_, task)| !task.is_finished());
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::runtime::{Builder, Runtime};

    fn paused_runtime() -> Runtime {
        Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap()
    }

    fn advance(rt: &Runtime, by: Duration) {
        rt.block_on(async move { tokio::time::sleep(by).await });
    }

    #[test]
    fn fires_once_after_delay() {
        let rt = paused_runtime();
        let mut timers = Timers::new(rt.handle().clone());
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        timers.schedule("test", Duration::from_secs(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        advance(&rt, Duration::from_millis(2900));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.pending(), 1);

        advance(&rt, Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending(), 0);

        advance(&rt, Duration::from_secs(10));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn independent_timers_fire_in_order() {
        let rt = paused_runtime();
        let mut timers = Timers::new(rt.handle().clone());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let log = Arc::clone(&order);
        timers.schedule("slow", Duration::from_secs(3), move || log.lock().push("slow"));
        let log = Arc::clone(&order);
        timers.schedule("fast", Duration::from_secs(1), move || log.lock().push("fast"));

        advance(&rt, Duration::from_millis(1500));
        assert_eq!(*order.lock(), vec!["fast"]);

        advance(&rt, Duration::from_secs(2));
        assert_eq!(*order.lock(), vec!["fast", "slow"]);
    }

    #[test]
    fn cancel_all_prevents_firing() {
        let rt = paused_runtime();
        let mut timers = Timers::new(rt.handle().clone());
        let fired = Arc::new(AtomicUsize::new(0));

        for secs in [1, 2] {
            let counter = Arc::clone(&fired);
            timers.schedule("test", Duration::from_secs(secs), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(timers.cancel_all(), 2);
        advance(&rt, Duration::from_secs(5));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.pending(), 0);
    }
}
