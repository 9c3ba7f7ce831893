//! Logging policy and logger construction
//!
//! Two sinks exist: a console stream on stderr and an optional log file. The
//! interactive `mini` session owns the terminal, so [`LoggingPolicy::for_interactive`]
//! disables the console stream unless logs are also going to a file.
//!
//! Loggers are built as standalone [`Dispatch`]es. They are only installed as
//! the process-wide default when asked to, which keeps construction free of
//! global side effects.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing::{dispatcher, Dispatch, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::field::RecordFields;
use tracing_subscriber::fmt::format::{DefaultFields, FormatFields, Writer};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

use crate::error::BootstrapError;

/// Filter applied to the file sink when none is configured
pub const DEFAULT_FILE_FILTER: &str = "info";

// ----------------------------------------------------------------------------
// Policy
// ----------------------------------------------------------------------------

/// Logging flags as requested by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingRequest {
    pub log_file: String,
    pub console_filter: String,
    pub file_filter: String,
}

/// Resolved logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingPolicy {
    /// Log file path, empty when file logging is off
    pub log_file: String,
    /// Console filter expression, empty when console logging is off
    pub console_filter: String,
    pub file_filter: String,
}

impl LoggingPolicy {
    /// Policy for commands that draw an interactive UI on the terminal
    ///
    /// Without a log file the console filter is cleared: log lines written to
    /// the terminal would interleave with the UI.
    pub fn for_interactive(request: LoggingRequest) -> Self {
        let console_filter = if request.log_file.is_empty() {
            String::new()
        } else {
            request.console_filter
        };

        Self {
            log_file: request.log_file,
            console_filter,
            file_filter: request.file_filter,
        }
    }

    /// Policy for commands that do not own the terminal
    pub fn for_background(request: LoggingRequest) -> Self {
        Self {
            log_file: request.log_file,
            console_filter: request.console_filter,
            file_filter: request.file_filter,
        }
    }

    pub fn console_enabled(&self) -> bool {
        !self.console_filter.is_empty()
    }

    pub fn file_enabled(&self) -> bool {
        !self.log_file.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Logger
// ----------------------------------------------------------------------------

/// Named logger handle backed by its own dispatcher
///
/// Log lines emitted through [`SessionLogger::in_scope`] or from futures
/// wrapped with [`SessionLogger::scope`] carry a `logger` span holding the
/// handle's name.
#[derive(Clone)]
pub struct SessionLogger {
    name: String,
    policy: LoggingPolicy,
    dispatch: Dispatch,
    span: Span,
    _guard: Option<Arc<WorkerGuard>>,
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLogger")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}

impl SessionLogger {
    /// Build the sinks described by `policy`
    ///
    /// A policy with neither sink yields a logger that discards everything.
    pub fn init(policy: LoggingPolicy) -> Result<Self, BootstrapError> {
        let console = if policy.console_enabled() {
            let filter = parse_filter(&policy.console_filter)?;
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(filter),
            )
        } else {
            None
        };

        let (file, guard) = if policy.file_enabled() {
            let filter = if policy.file_filter.is_empty() {
                parse_filter(DEFAULT_FILE_FILTER)?
            } else {
                parse_filter(&policy.file_filter)?
            };
            let file = open_log_file(Path::new(&policy.log_file))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .fmt_fields(PlainFields::default())
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter);
            (Some(layer), Some(Arc::new(guard)))
        } else {
            (None, None)
        };

        let dispatch = if console.is_none() && file.is_none() {
            Dispatch::none()
        } else {
            Dispatch::new(tracing_subscriber::registry().with(console).with(file))
        };

        Ok(Self {
            name: String::new(),
            policy,
            dispatch,
            span: Span::none(),
            _guard: guard,
        })
    }

    /// Child logger whose lines are tagged with `name`
    ///
    /// Names nest with dots, so `named("mini")` on a logger already named
    /// `node` yields `node.mini`.
    pub fn named(&self, name: &str) -> Self {
        let full = if self.name.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.name, name)
        };

        let span = dispatcher::with_default(&self.dispatch, || {
            tracing::info_span!(parent: &self.span, "logger", name = %full)
        });

        Self {
            name: full,
            policy: self.policy.clone(),
            dispatch: self.dispatch.clone(),
            span,
            _guard: self._guard.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &LoggingPolicy {
        &self.policy
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `f` with this logger as the active dispatcher and span
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, || self.span.in_scope(f))
    }

    /// Attach this logger to a future
    pub fn scope<F>(&self, fut: F) -> tracing::instrument::WithDispatch<tracing::instrument::Instrumented<F>>
    where
        F: std::future::Future,
    {
        use tracing::instrument::{Instrument, WithSubscriber};
        fut.instrument(self.span.clone())
            .with_subscriber(self.dispatch.clone())
    }

    /// Install this logger's dispatcher as the process-wide default
    ///
    /// Components that spawn their own tasks (the node, listeners) log
    /// through the global default. Fails if a default is already set.
    pub fn install(&self) -> Result<(), BootstrapError> {
        dispatcher::set_global_default(self.dispatch.clone()).map_err(BootstrapError::logger)
    }
}

/// Span field formatter for the file sink
///
/// Formatted span fields are cached per formatter type. A distinct type keeps
/// the file sink from reusing fields the console sink rendered with colours.
#[derive(Debug, Default)]
struct PlainFields(DefaultFields);

impl<'writer> FormatFields<'writer> for PlainFields {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'writer>, fields: R) -> std::fmt::Result {
        self.0.format_fields(writer, fields)
    }
}

fn parse_filter(expression: &str) -> Result<EnvFilter, BootstrapError> {
    EnvFilter::try_new(expression)
        .map_err(|e| BootstrapError::logger(format!("invalid filter {:?}: {}", expression, e)))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, BootstrapError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            BootstrapError::logger(format!("cannot create log directory {}: {}", parent.display(), e))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| BootstrapError::logger(format!("cannot open log file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(log_file: &str, console_filter: &str) -> LoggingRequest {
        LoggingRequest {
            log_file: log_file.to_string(),
            console_filter: console_filter.to_string(),
            file_filter: DEFAULT_FILE_FILTER.to_string(),
        }
    }

    #[test]
    fn test_interactive_without_log_file_clears_console_filter() {
        for filter in ["", "debug", "info,minichat=trace", "warn"] {
            let policy = LoggingPolicy::for_interactive(request("", filter));
            assert_eq!(policy.console_filter, "");
            assert!(!policy.console_enabled());
            assert!(!policy.file_enabled());

            // Clearing again changes nothing
            let again = LoggingPolicy::for_interactive(LoggingRequest {
                log_file: policy.log_file.clone(),
                console_filter: policy.console_filter.clone(),
                file_filter: policy.file_filter.clone(),
            });
            assert_eq!(again, policy);
        }
    }

    #[test]
    fn test_interactive_with_log_file_keeps_console_filter() {
        for filter in ["", "debug", "info", "warn,minichat_node=debug"] {
            let policy = LoggingPolicy::for_interactive(request("/tmp/x.log", filter));
            assert_eq!(policy.console_filter, filter);
            assert_eq!(policy.log_file, "/tmp/x.log");
        }
    }

    #[test]
    fn test_background_policy_is_unchanged() {
        let policy = LoggingPolicy::for_background(request("", "debug"));
        assert_eq!(policy.console_filter, "debug");
        assert!(policy.console_enabled());
    }

    #[test]
    fn test_disabled_logger_is_a_no_op() {
        let logger = SessionLogger::init(LoggingPolicy::default()).unwrap().named("mini");
        assert_eq!(logger.name(), "mini");
        assert!(logger.span().is_none());
        logger.in_scope(|| tracing::info!("dropped"));
    }

    #[test]
    fn test_names_nest() {
        let logger = SessionLogger::init(LoggingPolicy::default()).unwrap();
        assert_eq!(logger.named("node").named("mini").name(), "node.mini");
    }

    #[test]
    fn test_invalid_filter_fails_initialization() {
        let policy = LoggingPolicy::for_background(request("", "=[not a filter"));
        let err = SessionLogger::init(policy).unwrap_err();
        assert!(matches!(err, BootstrapError::LoggerInitialization { .. }));
    }

    #[test]
    fn test_file_logger_writes_named_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("mini.log");

        let policy = LoggingPolicy::for_interactive(request(path.to_str().unwrap(), "info"));
        {
            let logger = SessionLogger::init(policy).unwrap().named("mini");
            logger.in_scope(|| tracing::info!("session ready"));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("session ready"));
        assert!(contents.contains("name=mini"));
        assert!(!contents.contains('\u{1b}'), "escape codes in log file: {:?}", contents);
    }

    #[test]
    fn test_unwritable_log_file_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a log file
        let policy = LoggingPolicy::for_interactive(request(dir.path().to_str().unwrap(), ""));
        let err = SessionLogger::init(policy).unwrap_err();
        assert!(matches!(err, BootstrapError::LoggerInitialization { .. }));
    }
}
