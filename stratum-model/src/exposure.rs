//! Exposure metadata: what a remote caller may see or invoke.
//!
//! The model only records exposure. Enforcement belongs to whichever layer
//! serves remote calls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which parts of an attribute are visible across a layer boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeExposure {
    #[serde(default, skip_serializing_if = "is_false")]
    pub get: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub set: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl AttributeExposure {
    /// Readable remotely.
    pub fn get() -> Self {
        Self {
            get: true,
            set: false,
        }
    }

    /// Writable remotely.
    pub fn set() -> Self {
        Self {
            get: false,
            set: true,
        }
    }

    /// Readable and writable remotely.
    pub fn get_set() -> Self {
        Self {
            get: true,
            set: true,
        }
    }
}

/// A lifecycle operation a layer can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Get,
    Load,
    Save,
    Delete,
    Find,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Get,
        Operation::Load,
        Operation::Save,
        Operation::Delete,
        Operation::Find,
    ];

    /// Whether the operation only reads.
    pub fn is_read(self) -> bool {
        matches!(self, Operation::Get | Operation::Load | Operation::Find)
    }
}

/// Per-type table of remotely callable operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExposureTable(BTreeSet<Operation>);

impl ExposureTable {
    /// Nothing is callable remotely.
    pub fn none() -> Self {
        Self::default()
    }

    /// `get`, `load` and `find` are callable remotely.
    pub fn read_only() -> Self {
        Self(Operation::ALL.into_iter().filter(|op| op.is_read()).collect())
    }

    /// Every operation is callable remotely.
    pub fn full() -> Self {
        Self(Operation::ALL.into_iter().collect())
    }

    /// Adds an operation.
    #[must_use]
    pub fn expose(mut self, operation: Operation) -> Self {
        self.0.insert(operation);
        self
    }

    /// Removes an operation.
    #[must_use]
    pub fn hide(mut self, operation: Operation) -> Self {
        self.0.remove(&operation);
        self
    }

    pub fn allows(&self, operation: Operation) -> bool {
        self.0.contains(&operation)
    }

    /// True when only read operations are exposed (and at least one is).
    pub fn is_read_only(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|op| op.is_read())
    }

    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }
}
