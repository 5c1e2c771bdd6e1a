//! Installs and removes the process-wide low-level mouse hook.
//!
//! A stale `WH_MOUSE_LL` hook degrades input delivery for the whole desktop,
//! so [`MouseHook`] releases it on every path: explicit `uninstall`, and `Drop`
//! as the backstop.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::dispatch::Dispatcher;
use crate::error::HookError;

/// OS identifier of an installed hook. Not `Clone`: exactly one owner.
#[derive(Debug, PartialEq, Eq)]
pub struct HookHandle(isize);

impl HookHandle {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> isize {
        self.0
    }
}

/// Platform seam: registers a callback that feeds `dispatcher`.
pub trait HookBackend: Send {
    fn install(&mut self, dispatcher: Arc<Dispatcher>) -> Result<HookHandle, HookError>;
    fn uninstall(&mut self, handle: HookHandle);
}

pub struct MouseHook {
    dispatcher: Arc<Dispatcher>,
    backend: Box<dyn HookBackend>,
    handle: Option<HookHandle>,
}

impl MouseHook {
    /// Hook backed by the native implementation for this platform.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_backend(dispatcher, Box::new(PlatformBackend::default()))
    }

    pub fn with_backend(dispatcher: Arc<Dispatcher>, backend: Box<dyn HookBackend>) -> Self {
        Self {
            dispatcher,
            backend,
            handle: None,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Starts receiving every mouse message on the desktop. No-op when
    /// already installed.
    pub fn install(&mut self) -> Result<(), HookError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self.backend.install(Arc::clone(&self.dispatcher))?;
        tracing::info!("mouse hook installed (handle {:#x})", handle.raw());
        self.handle = Some(handle);
        Ok(())
    }

    /// Releases the hook if held. Safe to call repeatedly.
    pub fn uninstall(&mut self) {
        if let Some(handle) = self.handle.take() {
            let raw = handle.raw();
            self.backend.uninstall(handle);
            tracing::info!("mouse hook uninstalled (handle {raw:#x})");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for MouseHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Blocks until a freshly spawned hook thread reports whether it hooked.
///
/// The thread answers before it starts pumping messages, so there is no
/// timeout: returning early would leave a hook behind that nothing can remove.
/// On failure the thread has already exited and is joined here.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn await_ready<T>(
    ready: Receiver<Result<T, HookError>>,
    join: JoinHandle<()>,
) -> Result<(T, JoinHandle<()>), HookError> {
    match ready.recv() {
        Ok(Ok(value)) => Ok((value, join)),
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e)
        }
        Err(_) => {
            let _ = join.join();
            Err(HookError::ThreadStart(
                "hook thread exited without reporting".into(),
            ))
        }
    }
}

#[cfg(windows)]
pub type PlatformBackend = win::WindowsHookBackend;

#[cfg(not(windows))]
pub type PlatformBackend = UnsupportedBackend;

/// Backend for platforms without low-level hooks; every install fails.
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl HookBackend for UnsupportedBackend {
    fn install(&mut self, _dispatcher: Arc<Dispatcher>) -> Result<HookHandle, HookError> {
        Err(HookError::Unsupported)
    }

    fn uninstall(&mut self, _handle: HookHandle) {}
}

#[cfg(windows)]
mod win {
    use std::sync::mpsc::{sync_channel, SyncSender};
    use std::sync::{Arc, RwLock};
    use std::thread::JoinHandle;

    use once_cell::sync::Lazy;
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_XBUTTON1, VK_XBUTTON2};
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
        SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, WindowFromPoint, HHOOK, MSG,
        MSLLHOOKSTRUCT, PM_NOREMOVE, WH_MOUSE_LL, WM_QUIT,
    };

    use super::{HookBackend, HookHandle};
    use crate::dispatch::{msg, Disposition, Dispatcher, ExtraButtonState, RawEventRecord, WindowRef};
    use crate::error::HookError;

    /// The hook procedure is a bare function, so the dispatcher it feeds
    /// lives here for as long as the hook is installed.
    static ACTIVE: Lazy<RwLock<Option<Arc<Dispatcher>>>> = Lazy::new(|| RwLock::new(None));

    struct HookThread {
        thread_id: u32,
        join: JoinHandle<()>,
    }

    #[derive(Default)]
    pub struct WindowsHookBackend {
        thread: Option<HookThread>,
    }

    impl HookBackend for WindowsHookBackend {
        fn install(&mut self, dispatcher: Arc<Dispatcher>) -> Result<HookHandle, HookError> {
            {
                let mut slot = ACTIVE.write().unwrap_or_else(|e| e.into_inner());
                if slot.is_some() {
                    return Err(HookError::AlreadyActive);
                }
                *slot = Some(dispatcher);
            }

            let (ready_tx, ready_rx) = sync_channel::<Result<(u32, isize), HookError>>(1);
            let join = match std::thread::Builder::new()
                .name("mouse-hook".into())
                .spawn(move || run_hook_thread(ready_tx))
            {
                Ok(join) => join,
                Err(e) => {
                    clear_active();
                    return Err(HookError::ThreadStart(e.to_string()));
                }
            };

            match super::await_ready(ready_rx, join) {
                Ok(((thread_id, raw), join)) => {
                    self.thread = Some(HookThread { thread_id, join });
                    Ok(HookHandle::from_raw(raw))
                }
                Err(e) => {
                    clear_active();
                    Err(e)
                }
            }
        }

        fn uninstall(&mut self, _handle: HookHandle) {
            if let Some(th) = self.thread.take() {
                unsafe {
                    let _ = PostThreadMessageW(th.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
                }
                if th.join.join().is_err() {
                    tracing::error!("mouse hook thread panicked");
                }
            }
            clear_active();
        }
    }

    fn clear_active() {
        *ACTIVE.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn os_code(e: &windows::core::Error) -> u32 {
        let hr = e.code().0 as u32;
        // HRESULT_FROM_WIN32 wraps the Win32 code in the low word.
        if hr & 0xFFFF_0000 == 0x8007_0000 {
            hr & 0xFFFF
        } else {
            hr
        }
    }

    fn run_hook_thread(ready: SyncSender<Result<(u32, isize), HookError>>) {
        // Make sure the thread has a message queue before hooking.
        let mut msg = MSG::default();
        unsafe {
            let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        }
        let thread_id = unsafe { GetCurrentThreadId() };

        let hmodule = match unsafe { GetModuleHandleW(None) } {
            Ok(h) => h,
            Err(e) => {
                let _ = ready.send(Err(HookError::Install { code: os_code(&e) }));
                return;
            }
        };

        let hook = match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), hmodule, 0) } {
            Ok(h) if !h.0.is_null() => h,
            Ok(_) => {
                let e = windows::core::Error::from_win32();
                let _ = ready.send(Err(HookError::Install { code: os_code(&e) }));
                return;
            }
            Err(e) => {
                let _ = ready.send(Err(HookError::Install { code: os_code(&e) }));
                return;
            }
        };

        let _ = ready.send(Ok((thread_id, hook.0 as isize)));

        // The OS delivers WH_MOUSE_LL callbacks through this loop.
        loop {
            let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            if r.0 == 0 || r.0 == -1 {
                break;
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        unsafe {
            if let Err(e) = UnhookWindowsHookEx(hook) {
                tracing::error!("UnhookWindowsHookEx failed: {e}");
            }
        }
    }

    fn is_extra_button(message: u32) -> bool {
        matches!(
            message,
            msg::WM_XBUTTONDOWN
                | msg::WM_XBUTTONUP
                | msg::WM_XBUTTONDBLCLK
                | msg::WM_NCXBUTTONDOWN
                | msg::WM_NCXBUTTONUP
                | msg::WM_NCXBUTTONDBLCLK
        )
    }

    fn extra_key_state() -> ExtraButtonState {
        let down = |vk: i32| unsafe { (GetAsyncKeyState(vk) as u16 & 0x8000) != 0 };
        ExtraButtonState {
            x1_down: down(VK_XBUTTON1.0 as i32),
            x2_down: down(VK_XBUTTON2.0 as i32),
        }
    }

    fn window_at(pt: POINT) -> Option<WindowRef> {
        let hwnd: HWND = unsafe { WindowFromPoint(pt) };
        (!hwnd.0.is_null()).then(|| WindowRef(hwnd.0 as isize))
    }

    unsafe extern "system" fn mouse_proc(code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
        if code >= 0 {
            let dispatcher = ACTIVE.try_read().ok().and_then(|g| g.as_ref().map(Arc::clone));
            if let Some(dispatcher) = dispatcher {
                let info = &*(l_param.0 as *const MSLLHOOKSTRUCT);
                let message = w_param.0 as u32;
                // Window lookup is skipped for moves; they arrive far too often.
                let window = if message == msg::WM_MOUSEMOVE {
                    None
                } else {
                    window_at(info.pt)
                };
                let extra_keys = if is_extra_button(message) {
                    extra_key_state()
                } else {
                    ExtraButtonState::default()
                };
                let record = RawEventRecord {
                    code,
                    message,
                    x: info.pt.x,
                    y: info.pt.y,
                    mouse_data: info.mouseData,
                    window,
                    extra_keys,
                };
                if dispatcher.dispatch(&record) == Disposition::Consume {
                    return LRESULT(1);
                }
            }
        }
        CallNextHookEx(HHOOK(std::ptr::null_mut()), code, w_param, l_param)
    }
}
