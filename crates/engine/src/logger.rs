//! Thin structured-logging collaborator. The engine core never prints directly (the execution
//! report is the canonical result); this trait exists so step bodies can still emit
//! operator-facing diagnostics through a seam that tests can swap out, the same way they swap
//! `ShellExecutor`/`PrivilegeManager`.
//!
//! The production implementation is a thin adapter over the `log` facade (`debug!`/`info!`/
//! `warn!`/`error!`), consistent with the teacher's own use of `log` for structured messages
//! alongside `tracing` spans for instrumentation.

use std::fmt;

/// A single structured key-value pair attached to a log line.
pub type Field<'a> = (&'a str, &'a str);

pub trait Logger: Send + Sync {
    fn debug(&self, msg: &str, fields: &[Field]);
    fn info(&self, msg: &str, fields: &[Field]);
    fn warn(&self, msg: &str, fields: &[Field]);
    fn error(&self, msg: &str, fields: &[Field]);

    /// Returns a logger that prefixes every subsequent message with `prefix`.
    fn with_prefix(&self, prefix: &str) -> Box<dyn Logger>;

    /// Returns a logger that always attaches `fields` in addition to any passed per-call.
    fn with_fields(&self, fields: Vec<(String, String)>) -> Box<dyn Logger>;
}

fn render(prefix: &str, base_fields: &[(String, String)], msg: &str, fields: &[Field]) -> String {
    let mut out = String::new();
    if !prefix.is_empty() {
        out.push_str(prefix);
        out.push_str(": ");
    }
    out.push_str(msg);
    for (k, v) in base_fields {
        out.push_str(&format!(" {k}={v}"));
    }
    for (k, v) in fields {
        out.push_str(&format!(" {k}={v}"));
    }
    out
}

/// Default `Logger` backed by the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct LogLogger {
    prefix: String,
    base_fields: Vec<(String, String)>,
}

impl LogLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Logger for LogLogger {
    fn debug(&self, msg: &str, fields: &[Field]) {
        log::debug!("{}", render(&self.prefix, &self.base_fields, msg, fields));
    }

    fn info(&self, msg: &str, fields: &[Field]) {
        log::info!("{}", render(&self.prefix, &self.base_fields, msg, fields));
    }

    fn warn(&self, msg: &str, fields: &[Field]) {
        log::warn!("{}", render(&self.prefix, &self.base_fields, msg, fields));
    }

    fn error(&self, msg: &str, fields: &[Field]) {
        log::error!("{}", render(&self.prefix, &self.base_fields, msg, fields));
    }

    fn with_prefix(&self, prefix: &str) -> Box<dyn Logger> {
        Box::new(LogLogger {
            prefix: prefix.to_string(),
            base_fields: self.base_fields.clone(),
        })
    }

    fn with_fields(&self, fields: Vec<(String, String)>) -> Box<dyn Logger> {
        let mut base_fields = self.base_fields.clone();
        base_fields.extend(fields);
        Box::new(LogLogger {
            prefix: self.prefix.clone(),
            base_fields,
        })
    }
}

impl fmt::Display for LogLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogLogger(prefix={:?})", self.prefix)
    }
}

/// No-op logger used in tests that don't care about log output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _msg: &str, _fields: &[Field]) {}
    fn info(&self, _msg: &str, _fields: &[Field]) {}
    fn warn(&self, _msg: &str, _fields: &[Field]) {}
    fn error(&self, _msg: &str, _fields: &[Field]) {}

    fn with_prefix(&self, _prefix: &str) -> Box<dyn Logger> {
        Box::new(NullLogger)
    }

    fn with_fields(&self, _fields: Vec<(String, String)>) -> Box<dyn Logger> {
        Box::new(NullLogger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_prefix_and_fields() {
        let rendered = render("packages", &[("family".to_string(), "debian".to_string())], "installing", &[("count", "3")]);
        assert_eq!(rendered, "packages: installing family=debian count=3");
    }
}
