//! Orderly teardown, shared by the window closing and the tray's Quit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::dispatch::Dispatcher;
use crate::hook::MouseHook;
use crate::worker::WorkerHandle;

pub fn lock_hook(hook: &Mutex<MouseHook>) -> MutexGuard<'_, MouseHook> {
    hook.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Shutdown {
    worker: Mutex<Option<WorkerHandle>>,
    hook: Arc<Mutex<MouseHook>>,
    dispatcher: Arc<Dispatcher>,
    done: AtomicBool,
}

impl Shutdown {
    pub fn new(worker: WorkerHandle, hook: Arc<Mutex<MouseHook>>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            worker: Mutex::new(Some(worker)),
            hook,
            dispatcher,
            done: AtomicBool::new(false),
        }
    }

    /// Stops in-flight work, then releases the hook and drops every listener.
    /// Only the first call does anything; it returns `true`.
    pub fn run(&self) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
        lock_hook(&self.hook).uninstall();
        self.dispatcher.registry().clear();
        tracing::info!("shutdown complete");
        true
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// If nothing has shut down within `grace`, shuts down here and calls
    /// `exit`. Covers a window whose event loop no longer runs.
    pub fn arm_watchdog<F>(self: &Arc<Self>, grace: Duration, exit: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("quit-watchdog".into())
            .spawn(move || {
                thread::sleep(grace);
                if this.run() {
                    tracing::warn!("window did not close within {grace:?}; exiting");
                    exit();
                }
            });
        if let Err(e) = spawned {
            tracing::error!("spawn quit watchdog: {e}");
        }
    }
}
