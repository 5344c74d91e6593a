//! Structured results of a reconcile pass
//!
//! Every apply returns an [`ObjectOutcome`]; a full pass collects them in a
//! [`ReconcileReport`] whose [`PassState`] tells the caller whether to retry.

use std::fmt;

use pgcluster_workload::ObjectKind;

use crate::ClientError;

/// Mutation the driver performed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Object was created
    Created,
    /// Object was overwritten
    Updated,
}

/// Why the driver left an object untouched
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Object already exists and is left as is
    AlreadyExists,
    /// Existence probe failed with something other than NotFound
    ProbeFailed(String),
}

/// Broad class of a failed apply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Transport or validation failure from the platform
    Platform,
    /// The object changed or appeared between the read and the write
    /// (HTTP 409)
    Conflict,
}

/// Result of applying one object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectStatus {
    /// Object was created or updated
    Applied(Mutation),
    /// No mutation was issued
    Skipped(SkipReason),
    /// The attempt failed
    Failed {
        /// Failure class
        class: FailureClass,
        /// Error detail
        detail: String,
    },
}

impl ObjectStatus {
    /// True when the object is known to match what the pass wanted
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Applied(_) | Self::Skipped(SkipReason::AlreadyExists)
        )
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied(Mutation::Created) => f.write_str("created"),
            Self::Applied(Mutation::Updated) => f.write_str("updated"),
            Self::Skipped(SkipReason::AlreadyExists) => f.write_str("skipped: already exists"),
            Self::Skipped(SkipReason::ProbeFailed(detail)) => {
                write!(f, "skipped: probe failed: {}", detail)
            }
            Self::Failed { class, detail } => write!(f, "failed ({:?}): {}", class, detail),
        }
    }
}

/// Outcome of one object in a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectOutcome {
    /// Object kind
    pub kind: ObjectKind,
    /// Object name
    pub name: String,
    /// What happened
    pub status: ObjectStatus,
}

impl ObjectOutcome {
    /// Object was created or updated
    pub fn applied(kind: ObjectKind, name: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            kind,
            name: name.into(),
            status: ObjectStatus::Applied(mutation),
        }
    }

    /// Object was left untouched
    pub fn skipped(kind: ObjectKind, name: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            kind,
            name: name.into(),
            status: ObjectStatus::Skipped(reason),
        }
    }

    /// Apply failed with a platform error
    pub fn failed(kind: ObjectKind, name: impl Into<String>, err: &ClientError) -> Self {
        let class = match err {
            ClientError::AlreadyExists
            | ClientError::Platform {
                code: Some(409), ..
            } => FailureClass::Conflict,
            ClientError::NotFound | ClientError::Platform { .. } => FailureClass::Platform,
        };
        Self {
            kind,
            name: name.into(),
            status: ObjectStatus::Failed {
                class,
                detail: err.to_string(),
            },
        }
    }

    /// True when the apply failed outright
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ObjectStatus::Failed { .. })
    }
}

impl fmt::Display for ObjectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.name, self.status)
    }
}

/// Overall state of a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassState {
    /// Every object settled
    Converged,
    /// Some objects settled, some did not
    Partial,
    /// No object settled
    Failed,
}

/// All outcomes of one reconcile pass for one cluster
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `namespace/name` of the cluster
    pub cluster: String,
    /// Outcomes in apply order
    pub outcomes: Vec<ObjectOutcome>,
}

impl ReconcileReport {
    /// Empty report for a cluster
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            outcomes: Vec::new(),
        }
    }

    /// Record an outcome
    pub fn push(&mut self, outcome: ObjectOutcome) {
        self.outcomes.push(outcome);
    }

    /// Record several outcomes
    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = ObjectOutcome>) {
        self.outcomes.extend(outcomes);
    }

    /// Classify the pass
    pub fn state(&self) -> PassState {
        let settled = self
            .outcomes
            .iter()
            .filter(|o| o.status.is_settled())
            .count();
        if settled == self.outcomes.len() {
            PassState::Converged
        } else if settled == 0 {
            PassState::Failed
        } else {
            PassState::Partial
        }
    }

    /// Outcomes that did not settle
    pub fn unsettled(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_settled())
    }

    /// Outcomes for one kind
    pub fn for_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &ObjectOutcome> {
        self.outcomes.iter().filter(move |o| o.kind == kind)
    }

    /// One-line summary of everything that did not settle
    pub fn summary(&self) -> String {
        let unsettled: Vec<String> = self.unsettled().map(|o| o.to_string()).collect();
        if unsettled.is_empty() {
            format!("{} objects converged", self.outcomes.len())
        } else {
            format!(
                "{} of {} objects not converged: {}",
                unsettled.len(),
                self.outcomes.len(),
                unsettled.join("; ")
            )
        }
    }
}
