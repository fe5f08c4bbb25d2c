//! Record of connection-level actions

use parking_lot::Mutex;

/// One connection-level action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    Opened { connection: u64 },
    AutoCommit { connection: u64, enabled: bool },
    Prepared { connection: u64, procedure: String },
    Executed { connection: u64, procedure: String, success: bool },
    Committed { connection: u64 },
    RolledBack { connection: u64 },
    Closed { connection: u64 },
}

impl JournalEvent {
    /// Id of the connection the event belongs to
    pub fn connection(&self) -> u64 {
        match self {
            JournalEvent::Opened { connection }
            | JournalEvent::AutoCommit { connection, .. }
            | JournalEvent::Prepared { connection, .. }
            | JournalEvent::Executed { connection, .. }
            | JournalEvent::Committed { connection }
            | JournalEvent::RolledBack { connection }
            | JournalEvent::Closed { connection } => *connection,
        }
    }
}

/// Append-only event log shared by all connections of a database
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<JournalEvent>>,
}

impl Journal {
    pub(crate) fn record(&self, event: JournalEvent) {
        tracing::trace!(?event, "journal");
        self.events.lock().push(event);
    }

    /// Snapshot of all events in order
    pub fn events(&self) -> Vec<JournalEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&JournalEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn opens(&self) -> usize {
        self.count(|e| matches!(e, JournalEvent::Opened { .. }))
    }

    pub fn commits(&self) -> usize {
        self.count(|e| matches!(e, JournalEvent::Committed { .. }))
    }

    pub fn rollbacks(&self) -> usize {
        self.count(|e| matches!(e, JournalEvent::RolledBack { .. }))
    }

    pub fn closes(&self) -> usize {
        self.count(|e| matches!(e, JournalEvent::Closed { .. }))
    }

    /// Procedures executed, in order, with their outcome
    pub fn executions(&self) -> Vec<(String, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                JournalEvent::Executed {
                    procedure, success, ..
                } => Some((procedure.clone(), *success)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
