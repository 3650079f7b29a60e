use crate::program::ProgramError;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<(String, String)>> = const { RefCell::new(None) };
}

static HOOK_INSTALLED: Once = Once::new();

/// Install (once) a panic hook that records panics raised inside
/// [`guarded`] and defers to the previous hook for every other panic.
fn install_hook() {
    HOOK_INSTALLED.call_once(|| {
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !GUARDED.with(Cell::get) {
                original_hook(info);
                return;
            }
            let mut message = payload_message(info.payload());
            if let Some(location) = info.location() {
                message = format!("{message} at {location}");
            }
            let backtrace = Backtrace::force_capture().to_string();
            CAPTURED.with(|captured| *captured.borrow_mut() = Some((message, backtrace)));
        }));
    });
}

/// Run application code, turning a panic into [`ProgramError::Panicked`]
/// when `catch` is set.
pub(crate) fn guarded<T>(catch: bool, f: impl FnOnce() -> T) -> Result<T, ProgramError> {
    if !catch {
        return Ok(f());
    }
    install_hook();
    GUARDED.with(|guarded| guarded.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|guarded| guarded.set(false));
    result.map_err(|payload| {
        let (message, backtrace) = CAPTURED
            .with(|captured| captured.borrow_mut().take())
            .unwrap_or_else(|| (payload_message(payload.as_ref()), String::new()));
        ProgramError::Panicked { message, backtrace }
    })
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_without_panic() {
        assert_eq!(guarded(true, || 7).unwrap(), 7);
        assert_eq!(guarded(false, || 8).unwrap(), 8);
    }

    #[test]
    fn captures_message_and_backtrace() {
        let err = guarded(true, || -> u8 { panic!("bad state {}", 3) }).unwrap_err();
        match err {
            ProgramError::Panicked { message, backtrace } => {
                assert!(message.starts_with("bad state 3"));
                assert!(message.contains("panic.rs"));
                assert!(!backtrace.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn guard_is_cleared_after_a_panic() {
        let _ = guarded(true, || -> u8 { panic!("first") });
        assert!(!GUARDED.with(Cell::get));
        assert!(CAPTURED.with(|c| c.borrow().is_none()));
    }
}
