use crossbeam_channel::bounded;
use seltrans::config::TriggerButton;
use seltrans::dispatch::{msg, Dispatcher, MouseAction, MouseButton, MouseEvent, RawEventRecord};
use seltrans::worker::{listen_for_selection, prepare_source, should_trigger, Trigger, WorkerMsg};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn up(button: MouseButton, non_client: bool) -> MouseEvent {
    MouseEvent {
        action: MouseAction::Up,
        button,
        x: 0,
        y: 0,
        window: None,
        non_client,
    }
}

#[test]
fn left_trigger_only_accepts_left_button() {
    assert!(should_trigger(&up(MouseButton::Left, false), TriggerButton::Left));
    assert!(!should_trigger(&up(MouseButton::Right, false), TriggerButton::Left));
    assert!(!should_trigger(&up(MouseButton::XButton1, false), TriggerButton::Left));
}

#[test]
fn any_trigger_accepts_every_real_button() {
    for b in [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::XButton1,
        MouseButton::XButton2,
    ] {
        assert!(should_trigger(&up(b, false), TriggerButton::Any), "{b:?}");
    }
    assert!(!should_trigger(&up(MouseButton::None, false), TriggerButton::Any));
}

#[test]
fn non_client_release_never_triggers() {
    assert!(!should_trigger(&up(MouseButton::Left, true), TriggerButton::Any));
}

#[test]
fn prepare_source_trims_and_filters() {
    assert_eq!(prepare_source(None, None, true), None);
    assert_eq!(prepare_source(Some("   \r\n".into()), None, true), None);
    assert_eq!(
        prepare_source(Some("  hello \n".into()), None, true),
        Some("hello".to_string())
    );
    assert_eq!(prepare_source(Some("hello".into()), Some("hello"), true), None);
    assert_eq!(
        prepare_source(Some("hello".into()), Some("hello"), false),
        Some("hello".to_string())
    );
    assert_eq!(
        prepare_source(Some("world".into()), Some("hello"), true),
        Some("world".to_string())
    );
}

#[test]
fn mouse_up_queues_a_selection_trigger() {
    let d = Dispatcher::new();
    let (tx, rx) = bounded(4);
    let hold = Arc::new(AtomicBool::new(false));
    listen_for_selection(&d, tx, TriggerButton::Left, Arc::clone(&hold));

    d.dispatch(&RawEventRecord::new(msg::WM_LBUTTONDOWN, 0, 0));
    d.dispatch(&RawEventRecord::new(msg::WM_RBUTTONUP, 0, 0));
    assert!(rx.try_recv().is_err());

    d.dispatch(&RawEventRecord::new(msg::WM_LBUTTONUP, 0, 0));
    assert_eq!(rx.try_recv(), Ok(WorkerMsg::Trigger(Trigger::Selection)));

    hold.store(true, Ordering::Relaxed);
    d.dispatch(&RawEventRecord::new(msg::WM_LBUTTONUP, 0, 0));
    assert!(rx.try_recv().is_err());
}

#[test]
fn full_queue_never_blocks_the_hook() {
    let d = Dispatcher::new();
    let (tx, rx) = bounded(1);
    listen_for_selection(&d, tx, TriggerButton::Left, Arc::new(AtomicBool::new(false)));

    for _ in 0..5 {
        d.dispatch(&RawEventRecord::new(msg::WM_LBUTTONUP, 0, 0));
    }
    assert_eq!(rx.len(), 1);
}

#[derive(Default)]
struct RecordingPresenter {
    statuses: std::sync::Mutex<Vec<String>>,
}

impl seltrans::worker::Presenter for RecordingPresenter {
    fn show_status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    fn show_translation(&self, _source: &str, _translation: &str) {}
}

#[test]
fn worker_without_credentials_asks_for_them() {
    let presenter = Arc::new(RecordingPresenter::default());
    let mut handle =
        seltrans::worker::spawn(seltrans::config::Config::default(), presenter.clone()).unwrap();

    handle.trigger(Trigger::Clipboard);
    handle.stop();

    let statuses = presenter.statuses.lock().unwrap();
    assert_eq!(*statuses, vec![seltrans::worker::MISSING_CREDENTIALS_TEXT.to_string()]);
}

#[test]
fn stop_is_idempotent() {
    let presenter = Arc::new(RecordingPresenter::default());
    let mut handle =
        seltrans::worker::spawn(seltrans::config::Config::default(), presenter).unwrap();
    handle.stop();
    handle.stop();
}

/// Clipboard and translator stand-in. Text starting with "slow" takes a while.
#[derive(Default)]
struct ScriptedBackend {
    clipboard: std::sync::Mutex<Option<String>>,
    copies: std::sync::atomic::AtomicUsize,
    requests: std::sync::Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl ScriptedBackend {
    fn set_clipboard(&self, text: &str) {
        *self.clipboard.lock().unwrap() = Some(text.to_string());
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl seltrans::worker::Backend for ScriptedBackend {
    fn copy_selection(&self) -> anyhow::Result<()> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_clipboard(&self) -> Option<String> {
        self.clipboard.lock().unwrap().clone()
    }

    fn translate(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = seltrans::error::TranslateResult<String>> + Send {
        self.requests.lock().unwrap().push(text.to_string());
        let text = text.to_string();
        let fail = self.fail.load(Ordering::SeqCst);
        async move {
            if text.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(800)).await;
            }
            if fail {
                Err(seltrans::error::TranslateError::EmptyResult)
            } else {
                Ok(format!("<{text}>"))
            }
        }
    }
}

#[derive(Default)]
struct PipelinePresenter {
    statuses: std::sync::Mutex<Vec<String>>,
    shown: std::sync::Mutex<Vec<(String, String)>>,
}

impl PipelinePresenter {
    fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap().clone()
    }
}

impl seltrans::worker::Presenter for PipelinePresenter {
    fn show_status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    fn show_translation(&self, source: &str, translation: &str) {
        self.shown
            .lock()
            .unwrap()
            .push((source.to_string(), translation.to_string()));
    }
}

fn credentialed() -> seltrans::config::Config {
    seltrans::config::Config {
        appid: "id".into(),
        secret: "secret".into(),
        settle_delay_ms: 0,
        ..seltrans::config::Config::default()
    }
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn selection_is_copied_translated_and_shown() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_clipboard("  hello \n");
    let presenter = Arc::new(PipelinePresenter::default());
    let mut handle =
        seltrans::worker::spawn_with(credentialed(), backend.clone(), presenter.clone()).unwrap();

    handle.trigger(Trigger::Selection);
    wait_until("translation", || !presenter.shown().is_empty());
    handle.stop();

    assert_eq!(backend.copies.load(Ordering::SeqCst), 1);
    assert_eq!(backend.requests(), vec!["hello".to_string()]);
    assert_eq!(presenter.shown(), vec![("hello".to_string(), "<hello>".to_string())]);
    assert_eq!(
        *presenter.statuses.lock().unwrap(),
        vec![seltrans::worker::TRANSLATING_TEXT.to_string()]
    );
}

#[test]
fn unchanged_selection_is_skipped_but_clipboard_button_is_not() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_clipboard("hello");
    let presenter = Arc::new(PipelinePresenter::default());
    let mut handle =
        seltrans::worker::spawn_with(credentialed(), backend.clone(), presenter.clone()).unwrap();

    handle.trigger(Trigger::Selection);
    wait_until("first translation", || presenter.shown().len() == 1);

    handle.trigger(Trigger::Selection);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(backend.requests().len(), 1);

    handle.trigger(Trigger::Clipboard);
    wait_until("clipboard translation", || presenter.shown().len() == 2);
    handle.stop();
    assert_eq!(backend.requests(), vec!["hello".to_string(), "hello".to_string()]);
    assert_eq!(backend.copies.load(Ordering::SeqCst), 2);
}

#[test]
fn empty_clipboard_makes_no_request() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_clipboard(" \t ");
    let presenter = Arc::new(PipelinePresenter::default());
    let mut handle =
        seltrans::worker::spawn_with(credentialed(), backend.clone(), presenter.clone()).unwrap();

    handle.trigger(Trigger::Clipboard);
    std::thread::sleep(Duration::from_millis(200));
    handle.stop();

    assert!(backend.requests().is_empty());
    assert!(presenter.shown().is_empty());
}

#[test]
fn failed_translation_shows_the_fallback() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_clipboard("hello");
    backend.fail.store(true, Ordering::SeqCst);
    let presenter = Arc::new(PipelinePresenter::default());
    let mut handle =
        seltrans::worker::spawn_with(credentialed(), backend.clone(), presenter.clone()).unwrap();

    handle.trigger(Trigger::Clipboard);
    wait_until("fallback", || !presenter.shown().is_empty());
    handle.stop();

    assert_eq!(
        presenter.shown(),
        vec![(
            "hello".to_string(),
            seltrans::error::EMPTY_RESULT_TEXT.to_string()
        )]
    );
}

#[test]
fn new_trigger_cancels_the_running_one() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_clipboard("slow text");
    let presenter = Arc::new(PipelinePresenter::default());
    let mut handle =
        seltrans::worker::spawn_with(credentialed(), backend.clone(), presenter.clone()).unwrap();

    handle.trigger(Trigger::Clipboard);
    wait_until("slow request", || backend.requests().len() == 1);

    backend.set_clipboard("fast text");
    handle.trigger(Trigger::Clipboard);
    wait_until("fast translation", || !presenter.shown().is_empty());

    // Give the superseded request time to have finished had it survived.
    std::thread::sleep(Duration::from_millis(1000));
    handle.stop();
    assert_eq!(
        presenter.shown(),
        vec![("fast text".to_string(), "<fast text>".to_string())]
    );
}

#[test]
fn stop_cancels_a_pending_run() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_clipboard("slow text");
    let presenter = Arc::new(PipelinePresenter::default());
    let mut handle =
        seltrans::worker::spawn_with(credentialed(), backend.clone(), presenter.clone()).unwrap();

    handle.trigger(Trigger::Clipboard);
    wait_until("slow request", || backend.requests().len() == 1);
    let started = Instant::now();
    handle.stop();

    assert!(started.elapsed() < Duration::from_millis(700));
    assert!(presenter.shown().is_empty());
}

#[test]
fn mouse_up_after_stop_is_dropped_quietly() {
    let d = Dispatcher::new();
    let (tx, rx) = bounded(4);
    listen_for_selection(&d, tx, TriggerButton::Left, Arc::new(AtomicBool::new(false)));
    drop(rx);

    assert_eq!(
        d.dispatch(&RawEventRecord::new(msg::WM_LBUTTONUP, 0, 0)),
        seltrans::dispatch::Disposition::PassThrough
    );
}
