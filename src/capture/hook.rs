//! Process-wide panic hook.
//!
//! Chains the previously installed hook so default panic output is
//! preserved, captures a report through the agent, and optionally runs a
//! blocking send pass before the process dies. A panic raised while the
//! hook itself runs is passed straight to the previous hook.

use crate::agent::Agent;
use crate::capture::builder::ReportBuilder;
use std::cell::Cell;
use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

static HOOK_RUNNING: AtomicBool = AtomicBool::new(false);

thread_local! {
    static CAPTURE_SUPPRESSED: Cell<bool> = const { Cell::new(false) };
}

/// Run `f` with crash capture disabled on the calling thread.
///
/// The pass driver catches panics raised by senders and records them as
/// delivery failures; such a panic must not produce a crash report of its
/// own, and a crash-time pass triggered from the worker thread would
/// never complete.
pub(crate) fn without_capture<R>(f: impl FnOnce() -> R) -> R {
    struct Reset;
    impl Drop for Reset {
        fn drop(&mut self) {
            CAPTURE_SUPPRESSED.with(|c| c.set(false));
        }
    }

    CAPTURE_SUPPRESSED.with(|c| c.set(true));
    let _reset = Reset;
    f()
}

/// Install the crash-capturing panic hook for the given agent.
pub fn install_panic_hook(agent: Agent) {
    let previous_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        if CAPTURE_SUPPRESSED.with(|c| c.get()) {
            // The panic is being caught and handled by the pass driver.
            previous_hook(panic_info);
            return;
        }
        if HOOK_RUNNING.swap(true, Ordering::SeqCst) {
            // Recursive panic while capturing; do not try again.
            previous_hook(panic_info);
            return;
        }

        handle_panic(&agent, panic_info);

        HOOK_RUNNING.store(false, Ordering::SeqCst);
        previous_hook(panic_info);
    }));
}

fn handle_panic(agent: &Agent, panic_info: &PanicHookInfo<'_>) {
    let builder = builder_from_panic(panic_info);

    match agent.persist_report(builder) {
        Ok(_) => {
            // The process is going down; send now or not at all.
            if agent.config().send_on_crash {
                agent.flush();
            }
        }
        Err(e) => error!("Failed to persist crash report: {e}"),
    }
}

/// Extract message, location, thread and backtrace from panic info.
fn builder_from_panic(panic_info: &PanicHookInfo<'_>) -> ReportBuilder {
    let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };

    let mut builder = ReportBuilder::new(message)
        .current_thread()
        .capture_backtrace();

    if let Some(location) = panic_info.location() {
        builder = builder.location(format!(
            "{}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ));
    }

    builder
}
