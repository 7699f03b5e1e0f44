//! Retry-once policy shared by every engine call a session makes.

use crate::engine::{Engine, ErrorCode, ReturnCode};

/// Result of an engine call that may ask to be repeated.
pub(crate) trait Outcome {
    /// Returns true if the engine asked for the call to be repeated.
    fn is_retry(&self) -> bool;

    /// The value reported when a retry is escalated.
    fn fatal() -> Self;
}

impl Outcome for ReturnCode {
    fn is_retry(&self) -> bool {
        *self == ReturnCode::Retry
    }

    fn fatal() -> Self {
        ReturnCode::Fatal
    }
}

impl<T> Outcome for Result<T, ReturnCode> {
    fn is_retry(&self) -> bool {
        matches!(self, Err(ReturnCode::Retry))
    }

    fn fatal() -> Self {
        Err(ReturnCode::Fatal)
    }
}

/// Runs `call`, repeating it once if the engine answers `Retry`.
///
/// A second `Retry` is escalated to fatal. If the engine left no message
/// behind, `Retry for {operation} failed` is recorded so the caller never
/// sees an empty error.
pub(crate) fn retry_once<E, T, F>(engine: &mut E, operation: &str, mut call: F) -> T
where
    E: Engine + ?Sized,
    T: Outcome,
    F: FnMut(&mut E) -> T,
{
    let first = call(engine);
    if !first.is_retry() {
        return first;
    }
    log::debug!("{operation}: engine asked for a retry");

    let second = call(engine);
    if !second.is_retry() {
        return second;
    }
    log::debug!("{operation}: retry requested twice, giving up");
    if engine.error_message().is_none() {
        engine.set_error(ErrorCode::Misc, format!("Retry for {operation} failed"));
    }
    T::fatal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::entry::Entry;
    use crate::format::{FilterKind, FormatKind};
    use crate::passphrase::Passphrase;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Engine that answers `open_memory` from a script.
    #[derive(Default)]
    struct Scripted {
        open: VecDeque<ReturnCode>,
        calls: usize,
        error: Option<EngineError>,
    }

    impl Engine for Scripted {
        fn enable_format(&mut self, _: FormatKind) -> ReturnCode {
            ReturnCode::Ok
        }
        fn enable_filter(&mut self, _: FilterKind) -> ReturnCode {
            ReturnCode::Ok
        }
        fn add_passphrase(&mut self, _: &Passphrase) -> ReturnCode {
            ReturnCode::Ok
        }
        fn has_encrypted_entries(&self) -> bool {
            false
        }
        fn open_memory(&mut self, _: Arc<[u8]>) -> ReturnCode {
            self.calls += 1;
            self.open.pop_front().unwrap_or(ReturnCode::Ok)
        }
        fn next_header(&mut self, _: &mut Entry) -> ReturnCode {
            ReturnCode::Eof
        }
        fn read_data(&mut self, _: &mut [u8]) -> Result<usize, ReturnCode> {
            self.calls += 1;
            match self.open.pop_front() {
                Some(ReturnCode::Ok) | None => Ok(3),
                Some(code) => Err(code),
            }
        }
        fn error(&self) -> Option<&EngineError> {
            self.error.as_ref()
        }
        fn clear_error(&mut self) {
            self.error = None;
        }
        fn set_error(&mut self, code: ErrorCode, message: String) {
            self.error = Some(EngineError::new(code, message));
        }
    }

    fn scripted(codes: &[ReturnCode]) -> Scripted {
        Scripted {
            open: codes.iter().copied().collect(),
            ..Scripted::default()
        }
    }

    fn open(engine: &mut Scripted) -> ReturnCode {
        retry_once(engine, "open", |e| e.open_memory(Vec::new().into()))
    }

    #[test]
    fn test_no_retry_passes_through() {
        let mut engine = scripted(&[ReturnCode::Warn]);
        assert_eq!(open(&mut engine), ReturnCode::Warn);
        assert_eq!(engine.calls, 1);
    }

    #[test]
    fn test_single_retry_is_absorbed() {
        let mut engine = scripted(&[ReturnCode::Retry, ReturnCode::Ok]);
        assert_eq!(open(&mut engine), ReturnCode::Ok);
        assert_eq!(engine.calls, 2);
        assert!(engine.error().is_none());
    }

    #[test]
    fn test_second_retry_escalates_with_synthetic_message() {
        let mut engine = scripted(&[ReturnCode::Retry, ReturnCode::Retry, ReturnCode::Ok]);
        assert_eq!(open(&mut engine), ReturnCode::Fatal);
        assert_eq!(engine.calls, 2);
        assert_eq!(engine.error_message(), Some("Retry for open failed"));
    }

    #[test]
    fn test_second_retry_keeps_engine_message() {
        let mut engine = scripted(&[ReturnCode::Retry, ReturnCode::Retry]);
        engine.set_error(ErrorCode::Io, "device busy".into());
        assert_eq!(open(&mut engine), ReturnCode::Fatal);
        assert_eq!(engine.error_message(), Some("device busy"));
    }

    #[test]
    fn test_read_results_retry() {
        let mut engine = scripted(&[ReturnCode::Retry, ReturnCode::Ok]);
        let mut buf = [0u8; 8];
        let got = retry_once(&mut engine, "read data", |e| e.read_data(&mut buf));
        assert_eq!(got, Ok(3));

        let mut engine = scripted(&[ReturnCode::Retry, ReturnCode::Retry]);
        let got = retry_once(&mut engine, "read data", |e| e.read_data(&mut buf));
        assert_eq!(got, Err(ReturnCode::Fatal));
        assert_eq!(engine.error_message(), Some("Retry for read data failed"));
    }
}
