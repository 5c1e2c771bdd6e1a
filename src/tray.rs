//! Tray icon with Show window, Pause/Resume hook and Quit.

use crate::error::HookError;
use crate::hook::MouseHook;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrayAction {
    ShowWindow,
    /// Uninstall the hook if it is installed, install it otherwise.
    TogglePause,
    Quit,
}

/// Menu text for the pause item given whether the hook is live.
pub fn pause_label(installed: bool) -> &'static str {
    if installed {
        "Pause hook"
    } else {
        "Resume hook"
    }
}

/// Flips `hook` between installed and not. Returns the state it ended in.
pub fn toggle_hook(hook: &mut MouseHook) -> Result<bool, HookError> {
    if hook.is_installed() {
        hook.uninstall();
        Ok(false)
    } else {
        hook.install()?;
        Ok(true)
    }
}

#[cfg(windows)]
pub use self::win::{spawn, TrayHandle};

#[cfg(windows)]
mod win {
    use std::sync::mpsc::Sender;

    use crossbeam_channel::Receiver;
    use tray_icon as tri;
    use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
    use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

    use super::{pause_label, TrayAction};

    pub struct TrayHandle {
        #[allow(dead_code)]
        tray: TrayIcon,
        menu_event_rx: Receiver<MenuEvent>,
        tray_event_rx: Receiver<tri::TrayIconEvent>,
        show_item: MenuItem,
        pause_item: MenuItem,
        quit_item: MenuItem,
        action_tx: Sender<TrayAction>,
        /// Hook state reported back after each toggle.
        state_rx: Receiver<bool>,
    }

    impl TrayHandle {
        pub fn new(
            action_tx: Sender<TrayAction>,
            state_rx: Receiver<bool>,
            installed: bool,
        ) -> anyhow::Result<Self> {
            let menu = Menu::new();
            let show = MenuItem::new("Show window", true, None);
            let pause = MenuItem::new(pause_label(installed), true, None);
            let quit = MenuItem::new("Quit", true, None);
            let sep = PredefinedMenuItem::separator();
            menu.append_items(&[&show, &pause, &sep, &quit])?;

            // 16x16 solid amber square
            let (icon_w, icon_h) = (16, 16);
            let rgba: Vec<u8> = std::iter::repeat([0xF5, 0x9E, 0x0B, 0xFF])
                .take(icon_w * icon_h)
                .flatten()
                .collect();
            let icon = Icon::from_rgba(rgba, icon_w as u32, icon_h as u32)?;

            let tray = TrayIconBuilder::new()
                .with_tooltip("seltrans")
                .with_menu(Box::new(menu))
                .with_icon(icon)
                .build()?;

            Ok(Self {
                tray,
                menu_event_rx: MenuEvent::receiver().clone(),
                tray_event_rx: tri::TrayIconEvent::receiver().clone(),
                show_item: show,
                pause_item: pause,
                quit_item: quit,
                action_tx,
                state_rx,
            })
        }

        /// Non-blocking poll of menu and icon events.
        pub fn pump(&mut self) {
            while let Ok(event) = self.menu_event_rx.try_recv() {
                let id = event.id;
                if id == self.quit_item.id() {
                    tracing::info!("Tray: Quit clicked");
                    let _ = self.action_tx.send(TrayAction::Quit);
                } else if id == self.show_item.id() {
                    let _ = self.action_tx.send(TrayAction::ShowWindow);
                } else if id == self.pause_item.id() {
                    let _ = self.action_tx.send(TrayAction::TogglePause);
                }
            }
            while let Ok(installed) = self.state_rx.try_recv() {
                tracing::info!("Tray: hook {}", if installed { "active" } else { "paused" });
                self.pause_item.set_text(pause_label(installed));
            }
            while let Ok(event) = self.tray_event_rx.try_recv() {
                if matches!(event.click_type, tri::ClickType::Left | tri::ClickType::Double) {
                    let _ = self.action_tx.send(TrayAction::ShowWindow);
                }
            }
        }
    }

    /// Creates the tray icon and pumps its messages on a dedicated thread, so the
    /// non-`Send` tray types never leave it.
    pub fn spawn(action_tx: Sender<TrayAction>, state_rx: Receiver<bool>, installed: bool) {
        let spawned = std::thread::Builder::new()
            .name("tray".into())
            .spawn(move || {
                use windows::Win32::UI::WindowsAndMessaging as wm;

                let mut tray = match TrayHandle::new(action_tx, state_rx, installed) {
                    Ok(tray) => tray,
                    Err(e) => {
                        tracing::error!("tray failed: {e}");
                        return;
                    }
                };
                tracing::info!("tray created");
                loop {
                    unsafe {
                        let mut msg = wm::MSG::default();
                        while wm::PeekMessageW(&mut msg, None, 0, 0, wm::PM_REMOVE).as_bool() {
                            let _ = wm::TranslateMessage(&msg);
                            wm::DispatchMessageW(&msg);
                        }
                    }
                    tray.pump();
                    std::thread::sleep(std::time::Duration::from_millis(25));
                }
            });
        if let Err(e) = spawned {
            tracing::error!("spawn tray thread: {e}");
        }
    }
}
