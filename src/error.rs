//! Error types and diagnostic channels
//!
//! Two classes: caller errors (typed, recoverable, reported once on the
//! standard error stream) and system errors (fatal, terminate the process).

use std::fmt;
use std::io;
use std::process;

use crate::Tid;

/// Caller-class errors. No scheduler state is mutated when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// An operation was invoked before `init`.
    NotInitialized,

    /// `init` was invoked while the library is already live.
    AlreadyInitialized,

    /// The requested quantum has zero length.
    InvalidQuantum,

    /// Every thread id is in use.
    ThreadLimitReached { max: usize },

    /// No live thread carries this id.
    UnknownThread { tid: Tid },

    /// The bootstrap thread cannot be blocked.
    BootstrapBlocked,

    /// The bootstrap thread cannot be put to sleep.
    BootstrapSleep,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "thread library is not initialized"),
            Self::AlreadyInitialized => write!(f, "thread library is already initialized"),
            Self::InvalidQuantum => write!(f, "quantum length must be positive"),
            Self::ThreadLimitReached { max } => {
                write!(f, "thread limit reached ({} threads)", max)
            }
            Self::UnknownThread { tid } => write!(f, "no thread with id {}", tid),
            Self::BootstrapBlocked => write!(f, "cannot block the bootstrap thread"),
            Self::BootstrapSleep => write!(f, "cannot put the bootstrap thread to sleep"),
        }
    }
}

impl std::error::Error for ThreadError {}

/// Result type for thread library operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

impl ThreadError {
    /// Emit the caller-error diagnostic line and hand the error back.
    ///
    /// Every error return path goes through here exactly once, so the
    /// stderr contract stays uniform regardless of which operation failed.
    pub(crate) fn reported(self) -> Self {
        eprintln!("thread library error: {}", self);
        self
    }
}

/// System-class failure: diagnose with the OS error and end the process.
///
/// Used for the primitives the library cannot operate without: handler
/// installation, timer arming, signal-mask manipulation.
pub(crate) fn fatal(what: &str) -> ! {
    let errno = io::Error::last_os_error();
    eprintln!("system error: {}: {}", what, errno);
    process::exit(1);
}
