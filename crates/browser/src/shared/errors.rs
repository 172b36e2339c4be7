use settle_core::WatchError;

pub fn to_watch_error(e: impl std::fmt::Display, action: &str) -> WatchError {
    let s = e.to_string();
    if s.contains("Cannot find context")
        || s.contains("Execution context was destroyed")
        || s.contains("Inspected target navigated")
    {
        WatchError::context_lost(format!("{} interrupted: {}", action, s))
    } else {
        WatchError::document(format!("{} failed: {}", action, s))
    }
}
