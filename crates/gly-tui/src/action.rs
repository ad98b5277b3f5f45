//! Action enum: what a key press resolves to before the App applies it.

use gly_proto::protocol::Command;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Forward an intent to the core.
    Send(Command),
    SelectUp,
    SelectDown,
    SelectFirst,
    SelectLast,
    OpenTimerMenu,
    /// Move the sleep-timer menu highlight by this many rows.
    TimerMenuMove(isize),
    OpenUrlInput,
    /// Close whichever overlay is open and return to normal mode.
    CloseOverlay,
    Quit,
}
