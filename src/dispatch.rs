//! Classification of raw low-level mouse messages and fan-out to listeners.
//!
//! Everything here is platform neutral: the Windows hook procedure copies the
//! fields it needs out of `MSLLHOOKSTRUCT` into a [`RawEventRecord`] and hands
//! it to [`Dispatcher::dispatch`], which answers whether the message should
//! continue down the hook chain.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Window message identifiers as delivered in a low-level hook's `wParam`.
pub mod msg {
    pub const WM_MOUSEMOVE: u32 = 0x0200;
    pub const WM_LBUTTONDOWN: u32 = 0x0201;
    pub const WM_LBUTTONUP: u32 = 0x0202;
    pub const WM_LBUTTONDBLCLK: u32 = 0x0203;
    pub const WM_RBUTTONDOWN: u32 = 0x0204;
    pub const WM_RBUTTONUP: u32 = 0x0205;
    pub const WM_RBUTTONDBLCLK: u32 = 0x0206;
    pub const WM_MBUTTONDOWN: u32 = 0x0207;
    pub const WM_MBUTTONUP: u32 = 0x0208;
    pub const WM_MBUTTONDBLCLK: u32 = 0x0209;
    pub const WM_MOUSEWHEEL: u32 = 0x020A;
    pub const WM_XBUTTONDOWN: u32 = 0x020B;
    pub const WM_XBUTTONUP: u32 = 0x020C;
    pub const WM_XBUTTONDBLCLK: u32 = 0x020D;

    pub const WM_NCMOUSEMOVE: u32 = 0x00A0;
    pub const WM_NCLBUTTONDOWN: u32 = 0x00A1;
    pub const WM_NCLBUTTONUP: u32 = 0x00A2;
    pub const WM_NCLBUTTONDBLCLK: u32 = 0x00A3;
    pub const WM_NCRBUTTONDOWN: u32 = 0x00A4;
    pub const WM_NCRBUTTONUP: u32 = 0x00A5;
    pub const WM_NCRBUTTONDBLCLK: u32 = 0x00A6;
    pub const WM_NCMBUTTONDOWN: u32 = 0x00A7;
    pub const WM_NCMBUTTONUP: u32 = 0x00A8;
    pub const WM_NCMBUTTONDBLCLK: u32 = 0x00A9;
    pub const WM_NCXBUTTONDOWN: u32 = 0x00AB;
    pub const WM_NCXBUTTONUP: u32 = 0x00AC;
    pub const WM_NCXBUTTONDBLCLK: u32 = 0x00AD;
}

/// Hook code meaning "the record describes a real input message".
pub const HC_ACTION: i32 = 0;

/// Values of the high word of `mouseData` for extra-button messages.
const XBUTTON1: u32 = 0x0001;
const XBUTTON2: u32 = 0x0002;

/// Event kind; also the key listeners subscribe under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    Move,
    Down,
    Up,
    DoubleClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    None,
    Left,
    Right,
    Middle,
    XButton1,
    XButton2,
}

/// Button as far as the message code alone can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonSlot {
    None,
    Left,
    Right,
    Middle,
    /// One of the two extra buttons; which one needs the payload.
    Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub action: MouseAction,
    pub slot: ButtonSlot,
    pub non_client: bool,
}

/// Maps a message code to its action, button slot and non-client flag.
///
/// Returns `None` for messages the dispatcher does not republish (wheel,
/// horizontal wheel, anything unknown).
pub fn classify(message: u32) -> Option<Classification> {
    use msg::*;
    use ButtonSlot as B;
    use MouseAction as A;

    let (action, slot, non_client) = match message {
        WM_MOUSEMOVE => (A::Move, B::None, false),
        WM_LBUTTONDOWN => (A::Down, B::Left, false),
        WM_LBUTTONUP => (A::Up, B::Left, false),
        WM_LBUTTONDBLCLK => (A::DoubleClick, B::Left, false),
        WM_RBUTTONDOWN => (A::Down, B::Right, false),
        WM_RBUTTONUP => (A::Up, B::Right, false),
        WM_RBUTTONDBLCLK => (A::DoubleClick, B::Right, false),
        WM_MBUTTONDOWN => (A::Down, B::Middle, false),
        WM_MBUTTONUP => (A::Up, B::Middle, false),
        WM_MBUTTONDBLCLK => (A::DoubleClick, B::Middle, false),
        WM_XBUTTONDOWN => (A::Down, B::Extra, false),
        WM_XBUTTONUP => (A::Up, B::Extra, false),
        WM_XBUTTONDBLCLK => (A::DoubleClick, B::Extra, false),

        WM_NCMOUSEMOVE => (A::Move, B::None, true),
        WM_NCLBUTTONDOWN => (A::Down, B::Left, true),
        WM_NCLBUTTONUP => (A::Up, B::Left, true),
        WM_NCLBUTTONDBLCLK => (A::DoubleClick, B::Left, true),
        WM_NCRBUTTONDOWN => (A::Down, B::Right, true),
        WM_NCRBUTTONUP => (A::Up, B::Right, true),
        WM_NCRBUTTONDBLCLK => (A::DoubleClick, B::Right, true),
        WM_NCMBUTTONDOWN => (A::Down, B::Middle, true),
        WM_NCMBUTTONUP => (A::Up, B::Middle, true),
        WM_NCMBUTTONDBLCLK => (A::DoubleClick, B::Middle, true),
        WM_NCXBUTTONDOWN => (A::Down, B::Extra, true),
        WM_NCXBUTTONUP => (A::Up, B::Extra, true),
        WM_NCXBUTTONDBLCLK => (A::DoubleClick, B::Extra, true),
        _ => return None,
    };
    Some(Classification {
        action,
        slot,
        non_client,
    })
}

/// Logical up/down state of the extra buttons at the time of the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtraButtonState {
    pub x1_down: bool,
    pub x2_down: bool,
}

/// Works out which extra button a message refers to.
///
/// The high word of `mouse_data` names the button for low-level hooks and is
/// authoritative. Without it the key state is all there is, and when both
/// buttons are held the triggering one cannot be told apart: that case
/// reports `XButton1` and logs the ambiguity.
pub fn resolve_extra_button(mouse_data: u32, keys: ExtraButtonState) -> MouseButton {
    match mouse_data >> 16 {
        XBUTTON1 => return MouseButton::XButton1,
        XBUTTON2 => return MouseButton::XButton2,
        _ => {}
    }
    match (keys.x1_down, keys.x2_down) {
        (true, false) => MouseButton::XButton1,
        (false, true) => MouseButton::XButton2,
        (true, true) => {
            tracing::debug!("both extra buttons down; reporting XButton1");
            MouseButton::XButton1
        }
        (false, false) => MouseButton::None,
    }
}

/// Opaque reference to the native window under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowRef(pub isize);

/// One message as handed over by the hook procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEventRecord {
    pub code: i32,
    pub message: u32,
    pub x: i32,
    pub y: i32,
    pub mouse_data: u32,
    pub window: Option<WindowRef>,
    pub extra_keys: ExtraButtonState,
}

impl RawEventRecord {
    pub fn new(message: u32, x: i32, y: i32) -> Self {
        Self {
            code: HC_ACTION,
            message,
            x,
            y,
            mouse_data: 0,
            window: None,
            extra_keys: ExtraButtonState::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub button: MouseButton,
    pub x: i32,
    pub y: i32,
    pub window: Option<WindowRef>,
    pub non_client: bool,
}

/// What the hook procedure should do with the message afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the message to the next hook in the chain.
    PassThrough,
    /// Stop the message here.
    Consume,
}

pub type Listener = Arc<dyn Fn(&MouseEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    slots: RwLock<HashMap<MouseAction, Vec<(ListenerId, Listener)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: MouseAction, f: F) -> ListenerId
    where
        F: Fn(&MouseEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.entry(kind).or_default().push((id, Arc::new(f)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        for list in slots.values_mut() {
            if let Some(pos) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Snapshot of the listeners for `kind`, in subscription order.
    pub fn listeners(&self, kind: MouseAction) -> Vec<Listener> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(&kind)
            .map(|list| list.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: MouseAction) -> usize {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.values().all(Vec::is_empty)
    }

    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Turns raw records into [`MouseEvent`]s and fans them out.
#[derive(Default)]
pub struct Dispatcher {
    registry: ListenerRegistry,
    suppress_down: AtomicBool,
    suppress_move: AtomicBool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn on_down<F: Fn(&MouseEvent) + Send + Sync + 'static>(&self, f: F) -> ListenerId {
        self.registry.subscribe(MouseAction::Down, f)
    }

    pub fn on_up<F: Fn(&MouseEvent) + Send + Sync + 'static>(&self, f: F) -> ListenerId {
        self.registry.subscribe(MouseAction::Up, f)
    }

    pub fn on_move<F: Fn(&MouseEvent) + Send + Sync + 'static>(&self, f: F) -> ListenerId {
        self.registry.subscribe(MouseAction::Move, f)
    }

    pub fn on_double_click<F: Fn(&MouseEvent) + Send + Sync + 'static>(&self, f: F) -> ListenerId {
        self.registry.subscribe(MouseAction::DoubleClick, f)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Consume client-area button-down messages instead of broadcasting them.
    ///
    /// A suppressed down reaches no listener: it is swallowed before fan-out
    /// rather than raised and then swallowed, so a listener never sees a down
    /// that the target window didn't.
    pub fn set_suppress_down(&self, on: bool) {
        self.suppress_down.store(on, Ordering::Release);
    }

    pub fn suppress_down(&self) -> bool {
        self.suppress_down.load(Ordering::Acquire)
    }

    /// Consume client-area move messages instead of broadcasting them. Same
    /// delivery rule as [`Dispatcher::set_suppress_down`].
    pub fn set_suppress_move(&self, on: bool) {
        self.suppress_move.store(on, Ordering::Release);
    }

    pub fn suppress_move(&self) -> bool {
        self.suppress_move.load(Ordering::Acquire)
    }

    /// Entry point called from the hook procedure, once per message.
    ///
    /// Must stay cheap: listeners run inline on the hook thread.
    pub fn dispatch(&self, record: &RawEventRecord) -> Disposition {
        if record.code < 0 {
            return Disposition::PassThrough;
        }
        let Some(class) = classify(record.message) else {
            return Disposition::PassThrough;
        };

        if self.suppress_down() && is_client_button_down(record.message) {
            return Disposition::Consume;
        }
        if self.suppress_move() && record.message == msg::WM_MOUSEMOVE {
            return Disposition::Consume;
        }

        if record.code == HC_ACTION {
            let event = self.crack(record, class);
            for listener in self.registry.listeners(class.action) {
                // The hook procedure is an `extern "system"` frame; a panic must not cross it.
                if panic::catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                    tracing::error!("mouse listener panicked on {:?}", class.action);
                }
            }
        }
        Disposition::PassThrough
    }

    fn crack(&self, record: &RawEventRecord, class: Classification) -> MouseEvent {
        let button = match class.slot {
            ButtonSlot::None => MouseButton::None,
            ButtonSlot::Left => MouseButton::Left,
            ButtonSlot::Right => MouseButton::Right,
            ButtonSlot::Middle => MouseButton::Middle,
            ButtonSlot::Extra => resolve_extra_button(record.mouse_data, record.extra_keys),
        };
        MouseEvent {
            action: class.action,
            button,
            x: record.x,
            y: record.y,
            window: record.window,
            non_client: class.non_client,
        }
    }
}

fn is_client_button_down(message: u32) -> bool {
    matches!(
        message,
        msg::WM_LBUTTONDOWN | msg::WM_RBUTTONDOWN | msg::WM_MBUTTONDOWN | msg::WM_XBUTTONDOWN
    )
}
