#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use seltrans::config::Config;
use seltrans::dispatch::Dispatcher;
use seltrans::hook::MouseHook;
use seltrans::shutdown::{lock_hook, Shutdown};
use seltrans::ui::{self, UiOptions, WindowPresenter};
use seltrans::{logger, worker};

/// How long tray Quit waits for the window before tearing down without it.
#[cfg(windows)]
const QUIT_GRACE: std::time::Duration = std::time::Duration::from_secs(3);

fn toast(title: &str, body: &str) {
    #[cfg(windows)]
    {
        let _ = winrt_notification::Toast::new(winrt_notification::Toast::POWERSHELL_APP_ID)
            .title(title)
            .text1(body)
            .show();
    }
    #[cfg(not(windows))]
    {
        let _ = (title, body);
    }
}

#[cfg(windows)]
fn spawn_tray(hook: Arc<Mutex<MouseHook>>, shutdown: Arc<Shutdown>) {
    use seltrans::tray::{self, TrayAction};

    let (tray_tx, tray_rx) = std::sync::mpsc::channel::<TrayAction>();
    let (state_tx, state_rx) = crossbeam_channel::unbounded::<bool>();
    tray::spawn(tray_tx, state_rx, lock_hook(&hook).is_installed());

    std::thread::spawn(move || {
        while let Ok(act) = tray_rx.recv() {
            match act {
                TrayAction::ShowWindow => ui::show_window(),
                TrayAction::TogglePause => {
                    let mut h = lock_hook(&hook);
                    match tray::toggle_hook(&mut h) {
                        Ok(true) => ui::show_status("Select text anywhere to translate."),
                        Ok(false) => ui::show_status("Paused. Resume from the tray menu."),
                        Err(e) => {
                            tracing::error!("reinstall mouse hook: {e}");
                            ui::show_status(&format!("Mouse hook unavailable: {e}"));
                        }
                    }
                    let _ = state_tx.send(h.is_installed());
                }
                TrayAction::Quit => {
                    ui::request_close();
                    shutdown.arm_watchdog(QUIT_GRACE, || std::process::exit(0));
                }
            }
        }
    });
}

fn main() -> anyhow::Result<()> {
    let path = Config::path();
    let loaded = Config::load_from(&path);
    let first_run = loaded.is_err() && !path.exists();
    let mut cfg = loaded.as_ref().cloned().unwrap_or_default();
    cfg.apply_env();
    let _log_guard = logger::init(cfg.debug_log);
    if first_run {
        match Config::default().save() {
            Ok(()) => tracing::info!("wrote config template to {}", path.display()),
            Err(e) => tracing::warn!("write config template: {e:#}"),
        }
    } else if let Err(e) = &loaded {
        tracing::warn!("using default config: {e:#}");
    }
    tracing::info!(
        "config: {} -> {}, trigger {:?}, settle {} ms",
        cfg.from,
        cfg.to,
        cfg.trigger_button,
        cfg.settle_delay_ms
    );

    let dispatcher = Arc::new(Dispatcher::new());
    let worker = worker::spawn(cfg.clone(), Arc::new(WindowPresenter))?;
    let worker_tx = worker.sender();

    let focused = Arc::new(AtomicBool::new(false));
    worker::listen_for_selection(
        &dispatcher,
        worker_tx.clone(),
        cfg.trigger_button,
        Arc::clone(&focused),
    );

    let hook = Arc::new(Mutex::new(MouseHook::new(Arc::clone(&dispatcher))));
    let initial_status = match lock_hook(&hook).install() {
        Ok(()) if cfg.has_credentials() => {
            toast("seltrans", "Ready. Select text anywhere to translate.");
            "Select text anywhere to translate.".to_string()
        }
        Ok(()) => {
            toast("seltrans", "Missing translation credentials.");
            worker::MISSING_CREDENTIALS_TEXT.to_string()
        }
        Err(e) => {
            tracing::error!("mouse hook: {e}");
            toast("seltrans", &format!("Mouse hook failed: {e}"));
            format!("Mouse hook unavailable: {e}")
        }
    };

    // In-flight work goes first, then the system-wide hook.
    let shutdown = Arc::new(Shutdown::new(worker, Arc::clone(&hook), Arc::clone(&dispatcher)));

    #[cfg(windows)]
    spawn_tray(Arc::clone(&hook), Arc::clone(&shutdown));

    let ui_result = ui::run(UiOptions {
        focused,
        worker: Some(worker_tx),
        initial_status,
    });

    shutdown.run();
    ui_result
}
