//! The copy-and-translate pipeline that runs off the hook thread.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::clipboard;
use crate::config::{Config, TriggerButton};
use crate::dispatch::{Dispatcher, ListenerId, MouseButton, MouseEvent};
use crate::error::TranslateResult;
use crate::task::DelayedTask;
use crate::translate::{display_text, Translator};

pub const MISSING_CREDENTIALS_TEXT: &str =
    "Set appid and secret in config.json (or TRANSLATE_APPID / TRANSLATE_SECRET).";
pub const TRANSLATING_TEXT: &str = "Translating...";

/// Where a run gets its source text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Copy the current selection first, then read the clipboard.
    Selection,
    /// Translate whatever is already on the clipboard.
    Clipboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMsg {
    Trigger(Trigger),
    Shutdown,
}

/// Receives what the pipeline has to say.
pub trait Presenter: Send + Sync {
    fn show_status(&self, text: &str);
    fn show_translation(&self, source: &str, translation: &str);
}

/// What a run needs from the outside world: the clipboard and a translator.
pub trait Backend: Send + Sync + 'static {
    fn copy_selection(&self) -> anyhow::Result<()>;
    fn read_clipboard(&self) -> Option<String>;
    fn translate(&self, text: &str) -> impl Future<Output = TranslateResult<String>> + Send;
}

/// The OS clipboard plus the HTTP [`Translator`].
pub struct SystemBackend {
    translator: Translator,
}

impl SystemBackend {
    pub fn new(cfg: &Config) -> TranslateResult<Self> {
        Ok(Self {
            translator: Translator::new(cfg)?,
        })
    }
}

impl Backend for SystemBackend {
    fn copy_selection(&self) -> anyhow::Result<()> {
        clipboard::copy_selection()
    }

    fn read_clipboard(&self) -> Option<String> {
        clipboard::get_text()
    }

    fn translate(&self, text: &str) -> impl Future<Output = TranslateResult<String>> + Send {
        self.translator.translate(text)
    }
}

pub fn should_trigger(event: &MouseEvent, button: TriggerButton) -> bool {
    if event.non_client {
        return false;
    }
    match button {
        TriggerButton::Left => event.button == MouseButton::Left,
        TriggerButton::Any => event.button != MouseButton::None,
    }
}

/// Subscribes a mouse-up listener that queues a [`Trigger::Selection`].
///
/// Runs on the hook thread, so it only ever does a non-blocking send. While
/// `hold` is set (our own window has focus) mouse-ups are ignored.
pub fn listen_for_selection(
    dispatcher: &Dispatcher,
    tx: Sender<WorkerMsg>,
    button: TriggerButton,
    hold: Arc<AtomicBool>,
) -> ListenerId {
    dispatcher.on_up(move |event| {
        if hold.load(Ordering::Relaxed) || !should_trigger(event, button) {
            return;
        }
        match tx.try_send(WorkerMsg::Trigger(Trigger::Selection)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("worker queue full; dropping mouse-up at ({}, {})", event.x, event.y);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("worker stopped; ignoring mouse-up at ({}, {})", event.x, event.y);
            }
        }
    })
}

/// Cleans up clipboard text and decides whether it is worth a request.
pub fn prepare_source(raw: Option<String>, last: Option<&str>, skip_unchanged: bool) -> Option<String> {
    let text = raw?.trim().to_string();
    if text.is_empty() {
        return None;
    }
    if skip_unchanged && last == Some(text.as_str()) {
        return None;
    }
    Some(text)
}

pub struct WorkerHandle {
    tx: Sender<WorkerMsg>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn sender(&self) -> Sender<WorkerMsg> {
        self.tx.clone()
    }

    pub fn trigger(&self, trigger: Trigger) {
        let _ = self.tx.try_send(WorkerMsg::Trigger(trigger));
    }

    /// Cancels any in-flight run and waits for the worker thread to exit.
    pub fn stop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.tx.send(WorkerMsg::Shutdown);
            if join.join().is_err() {
                tracing::error!("translation worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn spawn(cfg: Config, presenter: Arc<dyn Presenter>) -> anyhow::Result<WorkerHandle> {
    let backend = SystemBackend::new(&cfg).context("build http client")?;
    spawn_with(cfg, Arc::new(backend), presenter)
}

pub fn spawn_with<B: Backend>(
    cfg: Config,
    backend: Arc<B>,
    presenter: Arc<dyn Presenter>,
) -> anyhow::Result<WorkerHandle> {
    let (tx, rx) = bounded::<WorkerMsg>(16);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("translate-rt")
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let join = thread::Builder::new()
        .name("translate-worker".into())
        .spawn(move || run(rt, cfg, backend, presenter, rx))
        .context("spawn worker thread")?;

    Ok(WorkerHandle {
        tx,
        join: Some(join),
    })
}

fn run<B: Backend>(
    rt: tokio::runtime::Runtime,
    cfg: Config,
    backend: Arc<B>,
    presenter: Arc<dyn Presenter>,
    rx: Receiver<WorkerMsg>,
) {
    tracing::info!("translation worker started");
    let last_source: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let mut pending: Option<DelayedTask<()>> = None;

    while let Ok(msg) = rx.recv() {
        let trigger = match msg {
            WorkerMsg::Shutdown => break,
            WorkerMsg::Trigger(t) => t,
        };

        if let Some(prev) = pending.take() {
            if !prev.is_finished() {
                tracing::debug!("superseding unfinished translation");
            }
            prev.cancel();
        }

        if !cfg.has_credentials() {
            presenter.show_status(MISSING_CREDENTIALS_TEXT);
            continue;
        }

        let delay = match trigger {
            Trigger::Selection => {
                if cfg.send_copy {
                    if let Err(e) = backend.copy_selection() {
                        tracing::warn!("copy selection: {e:#}");
                    }
                }
                cfg.settle_delay()
            }
            Trigger::Clipboard => Duration::ZERO,
        };

        let job = Job {
            backend: Arc::clone(&backend),
            presenter: Arc::clone(&presenter),
            last_source: Arc::clone(&last_source),
            skip_unchanged: cfg.skip_unchanged && trigger == Trigger::Selection,
        };
        pending = Some(DelayedTask::spawn(rt.handle(), delay, move || job.run()));
    }

    if let Some(task) = pending.take() {
        task.cancel();
        let _ = rt.block_on(task.wait());
    }
    rt.shutdown_timeout(Duration::from_secs(1));
    tracing::info!("translation worker stopped");
}

struct Job<B> {
    backend: Arc<B>,
    presenter: Arc<dyn Presenter>,
    last_source: Arc<Mutex<Option<String>>>,
    skip_unchanged: bool,
}

impl<B: Backend> Job<B> {
    async fn run(self) {
        let source = {
            let last = self.last_source.lock().unwrap_or_else(|e| e.into_inner());
            prepare_source(self.backend.read_clipboard(), last.as_deref(), self.skip_unchanged)
        };
        let Some(source) = source else {
            tracing::debug!("clipboard empty or unchanged; nothing to translate");
            return;
        };

        self.presenter.show_status(TRANSLATING_TEXT);
        let result = self.backend.translate(&source).await;
        match &result {
            Ok(_) => tracing::info!("translation ok ({} chars)", source.chars().count()),
            Err(e) => tracing::warn!("translation failed: {e}"),
        }
        let shown = display_text(result);

        *self.last_source.lock().unwrap_or_else(|e| e.into_inner()) = Some(source.clone());
        self.presenter.show_translation(&source, &shown);
    }
}
