//! Entry cursor.

use super::retry::retry_once;
use super::{Session, SessionState};
use crate::engine::{Engine, ReturnCode};
use crate::entry::Entry;
use crate::status::{Status, StatusKind};

/// Result of [`Session::advance`].
///
/// `End` and `Aborted` both mean "no entry", but only `End` is a clean
/// finish. The entry view borrows the session, so it cannot outlive the
/// next call that moves the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance<'a> {
    /// The cursor moved to this entry.
    Entry(&'a Entry),
    /// There are no more entries.
    End,
    /// Iteration stopped on a failure; see [`Session::status`].
    Aborted,
}

impl<'a> Advance<'a> {
    /// Returns the entry, if the cursor moved to one.
    pub fn entry(self) -> Option<&'a Entry> {
        match self {
            Advance::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// Returns true if iteration finished cleanly.
    pub fn is_end(&self) -> bool {
        matches!(self, Advance::End)
    }

    /// Returns true if iteration stopped on a failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Advance::Aborted)
    }
}

impl<E: Engine> Session<E> {
    /// Moves the cursor to the next entry.
    ///
    /// On a failed session this does nothing and returns
    /// [`Advance::Aborted`], leaving the status untouched.
    pub fn advance(&mut self) -> Advance<'_> {
        if self.state == SessionState::Failed {
            return Advance::Aborted;
        }

        let slot = self.entry.get_or_insert_with(Entry::default);
        let code = retry_once(&mut self.engine, "next header", |engine| {
            engine.next_header(slot)
        });
        match code {
            code if code.is_success() => {
                self.state = SessionState::Opened;
                self.status = self.settle(code, "next header");
            }
            ReturnCode::Eof => {
                self.engine.clear_error();
                self.entry = None;
                self.state = SessionState::Exhausted;
                self.status = Status::end_of_stream();
                return Advance::End;
            }
            _ => {
                self.fail(StatusKind::Fatal, "next header");
                return Advance::Aborted;
            }
        }
        self.entry.as_ref().map_or(Advance::Aborted, Advance::Entry)
    }
}
