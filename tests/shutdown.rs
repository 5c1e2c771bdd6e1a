use seltrans::config::Config;
use seltrans::dispatch::{Dispatcher, MouseAction};
use seltrans::error::HookError;
use seltrans::hook::{HookBackend, HookHandle, MouseHook};
use seltrans::shutdown::{lock_hook, Shutdown};
use seltrans::worker::{self, Presenter};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct CountingBackend {
    uninstalls: Arc<AtomicUsize>,
}

impl HookBackend for CountingBackend {
    fn install(&mut self, _d: Arc<Dispatcher>) -> Result<HookHandle, HookError> {
        Ok(HookHandle::from_raw(1))
    }

    fn uninstall(&mut self, _handle: HookHandle) {
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
    }
}

struct Silent;

impl Presenter for Silent {
    fn show_status(&self, _text: &str) {}
    fn show_translation(&self, _source: &str, _translation: &str) {}
}

fn fixture() -> (Arc<Shutdown>, Arc<Mutex<MouseHook>>, Arc<Dispatcher>, Arc<AtomicUsize>) {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.on_up(|_| {});
    let uninstalls = Arc::new(AtomicUsize::new(0));
    let backend = CountingBackend {
        uninstalls: Arc::clone(&uninstalls),
    };
    let hook = Arc::new(Mutex::new(MouseHook::with_backend(
        Arc::clone(&dispatcher),
        Box::new(backend),
    )));
    lock_hook(&hook).install().unwrap();

    let worker = worker::spawn(Config::default(), Arc::new(Silent)).unwrap();
    let shutdown = Arc::new(Shutdown::new(
        worker,
        Arc::clone(&hook),
        Arc::clone(&dispatcher),
    ));
    (shutdown, hook, dispatcher, uninstalls)
}

#[test]
fn run_releases_everything_once() {
    let (shutdown, hook, dispatcher, uninstalls) = fixture();

    assert!(shutdown.run());
    assert!(shutdown.is_done());
    assert!(!lock_hook(&hook).is_installed());
    assert!(dispatcher.registry().listeners(MouseAction::Up).is_empty());

    assert!(!shutdown.run());
    assert_eq!(uninstalls.load(Ordering::SeqCst), 1);
}

#[test]
fn watchdog_shuts_down_when_nothing_else_does() {
    let (shutdown, hook, _dispatcher, uninstalls) = fixture();
    let exited = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exited);

    shutdown.arm_watchdog(Duration::from_millis(50), move || {
        flag.store(true, Ordering::SeqCst)
    });
    std::thread::sleep(Duration::from_millis(600));

    assert!(exited.load(Ordering::SeqCst));
    assert!(!lock_hook(&hook).is_installed());
    assert_eq!(uninstalls.load(Ordering::SeqCst), 1);
}

#[test]
fn watchdog_stands_down_after_a_normal_close() {
    let (shutdown, _hook, _dispatcher, uninstalls) = fixture();
    let exited = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exited);

    shutdown.arm_watchdog(Duration::from_millis(100), move || {
        flag.store(true, Ordering::SeqCst)
    });
    assert!(shutdown.run());
    std::thread::sleep(Duration::from_millis(400));

    assert!(!exited.load(Ordering::SeqCst));
    assert_eq!(uninstalls.load(Ordering::SeqCst), 1);
}
