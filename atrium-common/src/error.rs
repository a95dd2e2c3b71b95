// Copyright 2026 atrium Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    backtrace::Backtrace,
    fmt::{Debug, Display},
    sync::Arc,
    time::Duration,
};

/// ErrorKind is all kinds of Error of atrium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backing source has no value for the key.
    NotFound,
    /// I/O error raised by the backing source.
    Io,
    /// The backing source is temporarily unavailable.
    Unavailable,
    /// Any other error raised by the backing source.
    External,
    /// Waited too long for another caller's in-flight fetch.
    Timeout,
    /// The in-flight fetch was abandoned before publishing a result.
    Cancelled,
    /// Config error.
    Config,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }

    /// Returns `true` if the error kind is produced by a backing source fetch.
    pub fn is_fetch(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::Io | ErrorKind::Unavailable | ErrorKind::External
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::NotFound => "Not found",
            ErrorKind::Io => "I/O error",
            ErrorKind::Unavailable => "Source unavailable",
            ErrorKind::External => "External error",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Config => "Config error",
        }
    }
}

/// Error is the error struct returned by all atrium functions.
///
/// ## Display
///
/// Error can be displayed in two ways:
///
/// - Via `Display`: like `err.to_string()` or `format!("{err}")`
///
/// Error will be printed in a single line:
///
/// ```shell
/// Not found, context: { key: 42 } => no such element
/// ```
///
/// - Via `Debug`: like `format!("{err:?}")`
///
/// Error will be printed in multi lines with context, source and backtrace (if captured).
///
/// - For conventional struct-style Debug representation, use `format!("{err:#?}")`.
///
/// ## Sharing
///
/// A failed fetch is delivered to the fetching caller and to every caller waiting on the same key, so [`Error`] is
/// [`Clone`]. The source error and the backtrace are reference counted; cloning copies the message and context only.
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,

    source: Option<Arc<anyhow::Error>>,
    backtrace: Option<Arc<Backtrace>>,
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            de.field("backtrace", &self.backtrace);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "  {}: {}", k, v)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "  {source:#}")?;
        }

        if let Some(backtrace) = &self.backtrace {
            writeln!(f)?;
            writeln!(f, "Backtrace:")?;
            writeln!(f, "{backtrace}")?;
        }

        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            let mut iter = self.context.iter().peekable();
            while let Some((k, v)) = iter.next() {
                write!(f, "{}: {}", k, v)?;
                if iter.peek().is_some() {
                    write!(f, ", ")?;
                }
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref().as_ref())
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            context: self.context.clone(),
            source: self.source.clone(),
            backtrace: self.backtrace.clone(),
        }
    }
}

impl Error {
    /// Create a new error.
    ///
    /// If the error needs to carry a source error, please use `with_source` method.
    ///
    /// For example:
    ///
    /// ```rust
    /// # use atrium_common::error::{Error, ErrorKind};
    /// let io_error = std::io::Error::other("disk is on fire");
    /// Error::new(ErrorKind::Io, "failed to read product").with_source(io_error);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            source: None,
            backtrace: Some(Arc::new(Backtrace::capture())),
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Notes
    ///
    /// If the source has been set, we will raise a panic here.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(Arc::new(source.into()));
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error context.
    pub fn context(&self) -> &Vec<(&'static str, String)> {
        &self.context
    }

    /// Get the error backtrace.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    /// Get the error source.
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_deref()
    }

    /// Downcast the reference of the source error to a specific error type reference.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if the error was produced by a backing source fetch.
    pub fn is_fetch(&self) -> bool {
        self.kind.is_fetch()
    }

    /// Returns `true` if the error is a bounded wait timing out.
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

/// Result type for atrium.
pub type Result<T> = std::result::Result<T, Error>;

/// Helper methods for Error.
impl Error {
    /// Helper for creating an [`ErrorKind::NotFound`] error for the given key.
    pub fn not_found(key: impl Debug) -> Self {
        Error::new(ErrorKind::NotFound, "no such element").with_context("key", format!("{key:?}"))
    }

    /// Helper for creating an [`ErrorKind::Timeout`] error after waiting for `waited`.
    pub fn timeout(waited: Duration) -> Self {
        Error::new(ErrorKind::Timeout, "in-flight fetch did not complete in time")
            .with_context("waited", format!("{waited:?}"))
    }

    /// Helper for creating an [`ErrorKind::Cancelled`] error.
    pub fn cancelled() -> Self {
        Error::new(ErrorKind::Cancelled, "in-flight fetch abandoned without a result")
    }

    /// Helper for creating an [`ErrorKind::External`] error from any source error.
    pub fn external(source: impl Into<anyhow::Error>) -> Self {
        Error::new(ErrorKind::External, "").with_source(source)
    }

    /// Helper for creating an [`ErrorKind::Config`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Config, message)
    }

    /// Helper for creating an [`ErrorKind::Io`] error from [`std::io::Error`].
    pub fn io_error(source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Error::new(ErrorKind::NotFound, "").with_source(source),
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => Error::new(ErrorKind::Unavailable, "").with_source(source),
            _ => Error::new(ErrorKind::Io, "").with_source(source),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io_error(e)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Error>();
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    #[test]
    fn test_error_display() {
        let io_error = std::io::Error::other("some I/O error");
        let err = Error::new(ErrorKind::Io, "an I/O error occurred")
            .with_source(io_error)
            .with_context("k1", "v1")
            .with_context("k2", "v2");

        assert_eq!(
            "I/O error, context: { k1: v1, k2: v2 } => an I/O error occurred, source: some I/O error",
            err.to_string()
        );
    }

    #[test]
    fn test_error_not_found_display() {
        let err = Error::not_found(1337);
        assert_eq!("Not found, context: { key: 1337 } => no such element", err.to_string());
        assert!(err.is_fetch());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_error_clone_shares_source() {
        let inner = TestError("shared".to_string());
        let err = Error::external(inner.clone()).with_context("key", 7);
        let cloned = err.clone();

        assert_eq!(err.kind(), cloned.kind());
        assert_eq!(err.context(), cloned.context());
        assert_eq!(cloned.downcast_ref::<TestError>(), Some(&inner));
        assert!(std::ptr::eq(
            err.source().unwrap() as *const _,
            cloned.source().unwrap() as *const _
        ));
    }

    #[test]
    fn test_error_kind_classification() {
        assert!(ErrorKind::NotFound.is_fetch());
        assert!(ErrorKind::Io.is_fetch());
        assert!(ErrorKind::Unavailable.is_fetch());
        assert!(ErrorKind::External.is_fetch());
        assert!(!ErrorKind::Timeout.is_fetch());
        assert!(!ErrorKind::Cancelled.is_fetch());
        assert!(!ErrorKind::Config.is_fetch());
    }

    #[test]
    fn test_io_error_mapping() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err: Error = std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        let err: Error = std::io::Error::other("boom").into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_format() {
        let e = Error::timeout(Duration::from_millis(3000)).with_context("key", 42);

        println!("========== BEGIN DISPLAY FORMAT ==========");
        println!("{e}");
        println!("========== END DISPLAY FORMAT ==========");

        println!();

        println!("========== BEGIN DEBUG FORMAT ==========");
        println!("{e:?}");
        println!("========== END DEBUG FORMAT ==========");

        println!();

        println!("========== BEGIN DEBUG FORMAT (PRETTY) ==========");
        println!("{e:#?}");
        println!("========== END DEBUG FORMAT (PRETTY) ==========");
    }
}
