use super::engine::{FaceComparator, FaceEncoding};
use crate::store::EncodingRecord;
use std::fmt;

/// Identity assigned to a detected face
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Known { label: String, blocked: bool },
    Unknown,
}

impl Identity {
    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            Identity::Known { label, .. } => label,
            Identity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of the enrolled faces for one doorbell.
///
/// Loaded once when the live loop starts and never refreshed while it runs;
/// new enrollments take effect on the next restart.
#[derive(Debug, Clone, Default)]
pub struct KnownFaceSet {
    records: Vec<EncodingRecord>,
}

impl KnownFaceSet {
    pub fn new(records: Vec<EncodingRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Nearest-neighbour identification.
    ///
    /// The closest known encoding is only accepted when the comparator's own
    /// match predicate also accepts it.
    pub fn identify(&self, comparator: &dyn FaceComparator, candidate: &FaceEncoding) -> Identity {
        let best = self
            .records
            .iter()
            .map(|record| (record, comparator.distance(&record.encoding, candidate)))
            .filter(|(_, distance)| !distance.is_nan())
            .min_by(|(_, a), (_, b)| a.total_cmp(b));

        match best {
            Some((record, _)) if comparator.matches(&record.encoding, candidate) => Identity::Known {
                label: record.label.clone(),
                blocked: record.blocked,
            },
            _ => Identity::Unknown,
        }
    }
}
