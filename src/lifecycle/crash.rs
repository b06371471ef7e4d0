//! Process-level crash reporting.
//!
//! Panics anywhere in the process go through the tracing pipeline. Panics
//! inside request handlers are additionally turned into 500 responses by the
//! server's catch-panic layer, so the process keeps serving.

/// Route panic reports to the logger.
///
/// Falls back to the default hook (stderr) when no logger is installed yet.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if !tracing::dispatcher::has_been_set() {
            default_hook(info);
            return;
        }

        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let thread = std::thread::current();

        tracing::error!(
            panic = %message,
            location = %location,
            thread = thread.name().unwrap_or("unnamed"),
            "Unhandled panic"
        );
    }));
}
