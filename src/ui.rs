use crate::clipboard;
use crate::worker::{Presenter, Trigger, WorkerMsg};
use crossbeam_channel::{unbounded, Receiver, Sender};
use eframe::egui;
use once_cell::sync::{Lazy, OnceCell};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TITLE: &str = "seltrans";
const WINDOW_SIZE: [f32; 2] = [420.0, 280.0];
const WINDOW_MARGIN: f32 = 8.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMsg {
    Status(String),
    Translation { source: String, text: String },
    Show,
    Close,
}

static OUTPUT: Lazy<(Sender<UiMsg>, Receiver<UiMsg>)> = Lazy::new(unbounded::<UiMsg>);
/// Set once the event loop is up; lets other threads wake it.
static CONTEXT: OnceCell<egui::Context> = OnceCell::new();
/// False after "Hide" until something brings the window back.
static WINDOW_VISIBLE: AtomicBool = AtomicBool::new(true);

/// How a message should bring the window back when it is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    /// Restore without taking focus from the app the user is in.
    Passive,
    /// Restore and bring to the foreground.
    Focus,
}

pub fn reveal_for(msg: &UiMsg, visible: bool) -> Option<Reveal> {
    match msg {
        UiMsg::Show => Some(Reveal::Focus),
        UiMsg::Translation { .. } if !visible => Some(Reveal::Passive),
        _ => None,
    }
}

pub fn is_window_visible() -> bool {
    WINDOW_VISIBLE.load(Ordering::Relaxed)
}

fn send(msg: UiMsg) {
    let reveal = reveal_for(&msg, is_window_visible());
    let _ = OUTPUT.0.send(msg);
    // A hidden window gets no frames, so it is restored natively first.
    if let Some(reveal) = reveal {
        native::restore(reveal);
    }
    if let Some(ctx) = CONTEXT.get() {
        ctx.request_repaint();
    }
}

pub fn show_status(text: &str) {
    send(UiMsg::Status(text.to_string()));
}

pub fn show_translation(source: &str, text: &str) {
    send(UiMsg::Translation {
        source: source.to_string(),
        text: text.to_string(),
    });
    tracing::debug!("UI: queued translation");
}

pub fn show_window() {
    send(UiMsg::Show);
}

/// Asks the window to close; `run` then returns on the main thread. Callers
/// that must not depend on the event loop arm [`crate::shutdown::Shutdown::arm_watchdog`].
pub fn request_close() {
    send(UiMsg::Close);
}

/// [`Presenter`] that forwards to the output window.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowPresenter;

impl Presenter for WindowPresenter {
    fn show_status(&self, text: &str) {
        show_status(text);
    }

    fn show_translation(&self, source: &str, translation: &str) {
        show_translation(source, translation);
    }
}

pub struct UiOptions {
    /// Kept in sync with whether our window has keyboard focus.
    pub focused: Arc<AtomicBool>,
    /// Where the "Translate clipboard" button sends its request.
    pub worker: Option<Sender<WorkerMsg>>,
    pub initial_status: String,
}

struct OutputApp {
    rx: Receiver<UiMsg>,
    focused: Arc<AtomicBool>,
    worker: Option<Sender<WorkerMsg>>,
    status: String,
    source: String,
    text: String,
    fonts_set: bool,
}

impl OutputApp {
    fn load_cjk_font(&mut self, ctx: &egui::Context) {
        if self.fonts_set {
            return;
        }
        self.fonts_set = true;
        let candidates = [
            r"C:\Windows\Fonts\msyh.ttc",
            r"C:\Windows\Fonts\msyh.ttf",
            r"C:\Windows\Fonts\simsun.ttc",
            r"C:\Windows\Fonts\simhei.ttf",
        ];
        let Some((path, bytes)) = candidates
            .iter()
            .find_map(|p| fs::read(p).ok().map(|b| (*p, b)))
        else {
            tracing::info!("no CJK font found; translations may render as boxes");
            return;
        };
        let mut fonts = egui::FontDefinitions::default();
        fonts
            .font_data
            .insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
        fonts
            .families
            .entry(egui::FontFamily::Proportional)
            .or_default()
            .insert(0, "cjk".to_owned());
        fonts
            .families
            .entry(egui::FontFamily::Monospace)
            .or_default()
            .insert(0, "cjk".to_owned());
        ctx.set_fonts(fonts);
        tracing::info!("loaded CJK font {path}");
    }

    fn drain(&mut self, ctx: &egui::Context) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                UiMsg::Status(s) => self.status = s,
                UiMsg::Translation { source, text } => {
                    self.status.clear();
                    self.source = source;
                    self.text = text;
                    // Show without stealing focus from the app the user selected in.
                    WINDOW_VISIBLE.store(true, Ordering::Relaxed);
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
                }
                UiMsg::Show => {
                    WINDOW_VISIBLE.store(true, Ordering::Relaxed);
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                UiMsg::Close => {
                    tracing::info!("UI: close requested");
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        }
    }
}

impl eframe::App for OutputApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Wake up periodically so the channel is polled without user input.
        ctx.request_repaint_after(Duration::from_millis(120));
        self.load_cjk_font(ctx);
        self.drain(ctx);
        self.focused
            .store(ctx.input(|i| i.focused), Ordering::Relaxed);

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Translation");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Hide").clicked() {
                        // Minimized rather than invisible: the taskbar can still restore it.
                        WINDOW_VISIBLE.store(false, Ordering::Relaxed);
                        ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
                    }
                    if ui.button("Copy").clicked() && !clipboard::set_text(&self.text) {
                        tracing::warn!("UI: failed to write clipboard");
                    }
                    if let Some(worker) = &self.worker {
                        if ui.button("Translate clipboard").clicked() {
                            let _ = worker.try_send(WorkerMsg::Trigger(Trigger::Clipboard));
                        }
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.status.is_empty() {
                ui.label(egui::RichText::new(&self.status).weak());
            }
            if !self.source.is_empty() {
                egui::CollapsingHeader::new("Source")
                    .default_open(false)
                    .show(ui, |ui| {
                        ui.label(&self.source);
                    });
            }
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut self.text)
                            .desired_rows(8)
                            .desired_width(f32::INFINITY),
                    );
                });
        });
    }
}

/// Runs the output window on the calling (main) thread until it closes.
pub fn run(opts: UiOptions) -> anyhow::Result<()> {
    tracing::info!("UI: starting event loop");
    let app = OutputApp {
        rx: OUTPUT.1.clone(),
        focused: opts.focused,
        worker: opts.worker,
        status: opts.initial_status,
        source: String::new(),
        text: String::new(),
        fonts_set: false,
    };
    WINDOW_VISIBLE.store(true, Ordering::Relaxed);
    let mut viewport = egui::ViewportBuilder::default()
        .with_title(TITLE)
        .with_inner_size(WINDOW_SIZE)
        .with_always_on_top()
        .with_visible(true);
    if let Some(work_area) = native::work_area() {
        viewport = viewport.with_position(top_right(work_area, WINDOW_SIZE, WINDOW_MARGIN));
    }
    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        TITLE,
        native_options,
        Box::new(|cc| {
            let _ = CONTEXT.set(cc.egui_ctx.clone());
            Box::new(app)
        }),
    )
    .map_err(|e| anyhow::anyhow!("UI error: {e}"))?;
    tracing::info!("UI: event loop exited");
    Ok(())
}

/// Top-left corner that pins a `size` window to the top right of
/// `work_area` (`[left, top, right, bottom]`, in points).
pub fn top_right(work_area: [f32; 4], size: [f32; 2], margin: f32) -> [f32; 2] {
    let [left, top, right, _] = work_area;
    let x = (right - size[0] - margin).max(left);
    [x, top + margin]
}

#[cfg(windows)]
mod native {
    use super::Reveal;
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::RECT;
    use windows::Win32::UI::HiDpi::GetDpiForSystem;
    use windows::Win32::UI::WindowsAndMessaging::{
        FindWindowW, SetForegroundWindow, ShowWindow, SystemParametersInfoW, SPI_GETWORKAREA,
        SW_RESTORE, SW_SHOWNOACTIVATE, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
    };

    pub fn restore(reveal: Reveal) {
        // Matches the viewport title.
        let Ok(hwnd) = (unsafe { FindWindowW(PCWSTR::null(), w!("seltrans")) }) else {
            return;
        };
        unsafe {
            match reveal {
                Reveal::Passive => {
                    let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
                }
                Reveal::Focus => {
                    let _ = ShowWindow(hwnd, SW_RESTORE);
                    let _ = SetForegroundWindow(hwnd);
                }
            }
        }
    }

    /// Desktop area not covered by the taskbar, in points.
    pub fn work_area() -> Option<[f32; 4]> {
        let mut rect = RECT::default();
        unsafe {
            SystemParametersInfoW(
                SPI_GETWORKAREA,
                0,
                Some(&mut rect as *mut RECT as *mut _),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
            .ok()?;
        }
        let scale = unsafe { GetDpiForSystem() } as f32 / 96.0;
        let scale = if scale > 0.0 { scale } else { 1.0 };
        Some([
            rect.left as f32 / scale,
            rect.top as f32 / scale,
            rect.right as f32 / scale,
            rect.bottom as f32 / scale,
        ])
    }
}

#[cfg(not(windows))]
mod native {
    use super::Reveal;

    pub fn restore(_reveal: Reveal) {}

    pub fn work_area() -> Option<[f32; 4]> {
        None
    }
}
