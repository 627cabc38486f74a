//! Logging context threaded through every component.
//!
//! A [`LogContext`] is built once at startup, borrowed by the embed pipeline
//! and retired at shutdown. Log lines go through the `log` facade; warnings,
//! errors and notices also reach the user through a [`Notifier`].

use std::fmt::Display;
use std::future::Future;

use log::{Level, LevelFilter};

/// User-visible toast collaborator.
pub trait Notifier {
    fn notify(&self, level: Level, message: &str);
}

/// Prints toasts to stderr. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, level: Level, message: &str) {
        eprintln!("{level}: {message}");
    }
}

pub struct LogContext {
    name: String,
    level: LevelFilter,
    notifier: Box<dyn Notifier>,
}

impl LogContext {
    pub fn new(name: &str, level: LevelFilter, notifier: Box<dyn Notifier>) -> Self {
        let ctx = Self {
            name: name.to_string(),
            level,
            notifier,
        };
        ctx.trace(&format!("logging context created at level {level}"));
        ctx
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    /// Raw toast, not gated by level.
    pub fn toast(&self, level: Level, message: &str) {
        self.notifier
            .notify(level, &format!("[{}] {message}", self.name));
    }

    fn emit(&self, level: Level, message: &str) {
        if self.enabled(level) {
            log::log!(target: "linkembed", level, "[{}] {}", self.name, message);
        }
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::Trace, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    /// Informational notice shown to the user regardless of level.
    pub fn notice(&self, message: &str) {
        self.emit(Level::Info, message);
        self.toast(Level::Info, message);
    }

    /// Logs and toasts. The toast is shown even when the level filters the log line.
    pub fn warn(&self, method: &str, err: impl Display) {
        let message = format!("Error in {method}: {err}");
        self.emit(Level::Warn, &message);
        self.toast(Level::Warn, &message);
    }

    pub fn error(&self, method: &str, err: impl Display) {
        let message = format!("Error in {method}: {err}");
        self.emit(Level::Error, &message);
        self.toast(Level::Error, &message);
    }

    pub fn retire(self) {
        self.trace("logging context retired");
        log::logger().flush();
    }
}

/// Error-wrapping decorator applied at command call sites.
///
/// When `enabled`, a failing operation toasts `Error in <op>: <err>`; the
/// error is returned unchanged either way.
pub async fn guarded<T, E, F>(ctx: &LogContext, enabled: bool, op: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let result = fut.await;
    if enabled {
        if let Err(ref err) = result {
            ctx.toast(Level::Error, &format!("Error in {op}: {err}"));
        }
    }
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Collects toasts so tests can count them.
    #[derive(Clone, Default)]
    pub struct RecordingNotifier {
        pub toasts: Rc<RefCell<Vec<(Level, String)>>>,
    }

    impl RecordingNotifier {
        pub fn count(&self, level: Level) -> usize {
            self.toasts.borrow().iter().filter(|(l, _)| *l == level).count()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, level: Level, message: &str) {
            self.toasts.borrow_mut().push((level, message.to_string()));
        }
    }

    pub fn recording_context(level: LevelFilter) -> (LogContext, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let ctx = LogContext::new("EmbedLinks", level, Box::new(notifier.clone()));
        (ctx, notifier)
    }

    #[test]
    fn test_warn_and_error_always_toast() {
        let (ctx, notifier) = recording_context(LevelFilter::Off);
        assert!(!ctx.enabled(Level::Warn));

        ctx.warn("embedUrl", "nope");
        ctx.error("embedUrl", "boom");
        assert_eq!(notifier.count(Level::Warn), 1);
        assert_eq!(notifier.count(Level::Error), 1);
        assert_eq!(
            notifier.toasts.borrow()[1].1,
            "[EmbedLinks] Error in embedUrl: boom"
        );
    }

    #[test]
    fn test_debug_never_toasts() {
        let (ctx, notifier) = recording_context(LevelFilter::Trace);
        ctx.trace("a");
        ctx.debug("b");
        ctx.info("c");
        assert!(notifier.toasts.borrow().is_empty());
    }

    #[test]
    fn test_notice_always_reaches_user() {
        let (ctx, notifier) = recording_context(LevelFilter::Off);
        ctx.notice("hello");
        assert_eq!(notifier.count(Level::Info), 1);
    }

    #[tokio::test]
    async fn test_guarded_toasts_only_when_enabled() {
        let (ctx, notifier) = recording_context(LevelFilter::Warn);

        let res: Result<(), String> = guarded(&ctx, false, "op", async { Err("bad".to_string()) }).await;
        assert!(res.is_err());
        assert_eq!(notifier.count(Level::Error), 0);

        let res: Result<(), String> = guarded(&ctx, true, "op", async { Err("bad".to_string()) }).await;
        assert_eq!(res, Err("bad".to_string()));
        assert_eq!(notifier.count(Level::Error), 1);
        assert!(notifier.toasts.borrow()[0].1.ends_with("Error in op: bad"));

        let res: Result<u8, String> = guarded(&ctx, true, "op", async { Ok(7) }).await;
        assert_eq!(res, Ok(7));
        assert_eq!(notifier.count(Level::Error), 1);
    }
}
