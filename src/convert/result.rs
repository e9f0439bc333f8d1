//! Run outcome bookkeeping.

use std::fmt;

use thiserror::Error;

use crate::error::IngestionError;

/// Process exit statuses.
///
/// These values are a stable interface for scripts driving batch conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// At least one table was created.
    Success = 0,
    /// No loader could be resolved for a URL, even when forcing HTML.
    FailedLoaderNotFound = 1,
    /// Sources were attempted but none produced a table.
    FailedConvert = 2,
    /// HTTP status error or invalid URL.
    FailedHttp = 3,
    /// Nothing was converted or attempted.
    NoInput = 4,
    /// The proxy aborted the connection (`ECONNABORTED`).
    FailedProxy = 103,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Success/fail/skip tally of one run. Counters only ever increase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultCounter {
    success: usize,
    fail: usize,
    skip: usize,
}

impl ResultCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_success(&mut self) {
        self.success += 1;
    }

    pub fn inc_fail(&mut self) {
        self.fail += 1;
    }

    pub fn inc_skip(&mut self) {
        self.skip += 1;
    }

    pub fn success_count(&self) -> usize {
        self.success
    }

    pub fn fail_count(&self) -> usize {
        self.fail
    }

    pub fn skip_count(&self) -> usize {
        self.skip
    }

    pub fn total_count(&self) -> usize {
        self.success + self.fail + self.skip
    }

    /// Final status of a run that did not end fatally.
    pub fn exit_code(&self) -> ExitCode {
        if self.success > 0 {
            ExitCode::Success
        } else if self.fail > 0 {
            ExitCode::FailedConvert
        } else {
            ExitCode::NoInput
        }
    }
}

impl fmt::Display for ResultCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "converted results: success={}, failed={}, skip={}",
            self.success, self.fail, self.skip
        )
    }
}

/// A condition that ends the whole run with `exit_code`.
#[derive(Debug, Error)]
#[error("{error} (exit code {})", exit_code.code())]
pub struct FatalError {
    pub exit_code: ExitCode,
    #[source]
    pub error: IngestionError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_precedence() {
        let mut counter = ResultCounter::new();
        assert_eq!(counter.exit_code(), ExitCode::NoInput);
        counter.inc_skip();
        assert_eq!(counter.exit_code(), ExitCode::NoInput);
        counter.inc_fail();
        assert_eq!(counter.exit_code(), ExitCode::FailedConvert);
        counter.inc_success();
        assert_eq!(counter.exit_code(), ExitCode::Success);
        assert_eq!(counter.total_count(), 3);
    }

    #[test]
    fn stable_codes() {
        assert_eq!(ExitCode::FailedLoaderNotFound.code(), 1);
        assert_eq!(ExitCode::FailedHttp.code(), 3);
        assert_eq!(ExitCode::FailedProxy.code(), 103);
    }

    #[test]
    fn summary_line() {
        let mut counter = ResultCounter::new();
        counter.inc_success();
        counter.inc_skip();
        assert_eq!(
            counter.to_string(),
            "converted results: success=1, failed=0, skip=1"
        );
    }
}
