//! Stack trace capture and summarisation for error logging.
//!
//! The request logger only prints the top few frames of a stack, so this
//! module turns the text produced by [`std::backtrace::Backtrace`] into a
//! list of `function @ location` frames with the capture machinery removed.
//!
//! # Panics
//!
//! A panicking handler has already unwound by the time the recovery
//! middleware sees it, so the stack has to be recorded from inside the panic
//! hook. [`install_panic_hook`] does that once per process and keeps the
//! previously installed hook running.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::sync::Once;

/// Leading frames that belong to backtrace capture, panic dispatch or the
/// internal-error helper, so the first kept frame is the caller.
const INTERNAL_FRAME_PREFIXES: [&str; 11] = [
    "std::backtrace",
    "std::backtrace_rs",
    "std::panicking",
    "std::panic",
    "std::sys",
    "core::panicking",
    "rust_begin_unwind",
    "__rust",
    "<alloc::boxed::Box<F,A> as core::ops::function::Fn<Args>>::call",
    "weblayer::stack::",
    "weblayer::responses::error_internal",
];

thread_local! {
    static LAST_PANIC_STACK: RefCell<Option<StackTrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// A single resolved frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Demangled function path.
    pub function: String,
    /// `file:line:col`, when debug info is available.
    pub location: Option<String>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} @ {}", self.function, location),
            None => f.write_str(&self.function),
        }
    }
}

/// Parsed stack trace, innermost frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    /// Capture the stack of the calling thread.
    ///
    /// Capture is forced regardless of `RUST_BACKTRACE`.
    pub fn capture() -> Self {
        Self::parse(&Backtrace::force_capture().to_string())
    }

    /// Parse the text format of [`Backtrace`]:
    ///
    /// ```text
    ///    0: my_crate::handler
    ///              at ./src/handler.rs:10:5
    ///    1: <unknown>
    /// ```
    ///
    /// Leading frames from backtrace capture and panic dispatch are dropped.
    pub fn parse(text: &str) -> Self {
        let mut frames: Vec<StackFrame> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if let Some(location) = line.strip_prefix("at ") {
                if let Some(last) = frames.last_mut()
                    && last.location.is_none()
                {
                    last.location = Some(location.to_string());
                }
            } else if let Some((index, function)) = line.split_once(": ")
                && !index.is_empty()
                && index.bytes().all(|b| b.is_ascii_digit())
            {
                frames.push(StackFrame {
                    function: strip_symbol_hash(function).to_string(),
                    location: None,
                });
            }
        }

        let skip = frames
            .iter()
            .take_while(|frame| is_internal_frame(&frame.function))
            .count();
        frames.drain(..skip);

        Self { frames }
    }

    /// All frames, innermost first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The innermost `levels` frames rendered as `function @ location`.
    pub fn summary(&self, levels: usize) -> Vec<String> {
        self.frames
            .iter()
            .take(levels)
            .map(ToString::to_string)
            .collect()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            writeln!(f, "{i:4}: {frame}")?;
        }
        Ok(())
    }
}

fn is_internal_frame(function: &str) -> bool {
    INTERNAL_FRAME_PREFIXES
        .iter()
        .any(|prefix| function.starts_with(prefix))
}

/// Drop a trailing `::h0123456789abcdef` symbol hash.
fn strip_symbol_hash(function: &str) -> &str {
    if let Some((path, hash)) = function.rsplit_once("::")
        && let Some(hex) = hash.strip_prefix('h')
        && hex.len() == 16
        && hex.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return path;
    }
    function
}

/// Install a process-wide panic hook that records the panicking thread's
/// stack for [`take_panic_stack`].
///
/// Calling this more than once has no further effect.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let stack = StackTrace::capture();
            LAST_PANIC_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            previous(info);
        }));
    });
}

/// Take the stack recorded by the last panic on this thread, if any.
pub fn take_panic_stack() -> Option<StackTrace> {
    LAST_PANIC_STACK.with(|slot| slot.borrow_mut().take())
}
