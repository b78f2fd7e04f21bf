//! Declaration tracking.
//!
//! Each distinct contract class is declared at most once per run. The class
//! hash is computed locally from the artifact, so the tracker can hand it
//! out immediately; the on-chain state is tracked explicitly and flips to
//! `Declared` when the batch confirms (or when the node reports the class
//! already exists).

use std::collections::HashMap;
use std::sync::Arc;

use starknet::core::types::FieldElement;
use tracing::debug;

use crate::artifacts::ContractArtifact;
use crate::orchestrator::batch::{CallBatcher, PendingCall};
use crate::types::ContractName;

/// On-chain state of a tracked class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    /// Declare enqueued but not yet confirmed
    Undeclared,
    /// Class confirmed on-chain (this run or a prior one)
    Declared,
}

#[derive(Debug)]
struct TrackedClass {
    class_hash: FieldElement,
    state: ClassState,
}

/// Per-run cache ensuring each class is declared at most once.
#[derive(Debug, Default)]
pub struct DeclarationTracker {
    classes: HashMap<ContractName, TrackedClass>,
}

impl DeclarationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a class as already declared in a previous run.
    pub fn seed_declared(&mut self, name: ContractName, class_hash: FieldElement) {
        self.classes.insert(
            name,
            TrackedClass {
                class_hash,
                state: ClassState::Declared,
            },
        );
    }

    /// Ensure `artifact`'s class is (or will be) declared, returning its
    /// locally computed class hash.
    ///
    /// Declarations are content-addressed: a cache entry only counts when
    /// its hash matches the artifact's locally computed one. The first call
    /// per class enqueues a declare; repeats return the cached hash without
    /// touching the batcher, and a recompiled artifact whose hash diverges
    /// from the cached (possibly manifest-seeded) entry gets a fresh
    /// declare. Skipping true duplicates is a correctness requirement, not
    /// just an optimization.
    pub fn declare(&mut self, artifact: &Arc<ContractArtifact>, batcher: &mut CallBatcher) -> FieldElement {
        if let Some(tracked) = self.classes.get(&artifact.name) {
            if tracked.class_hash == artifact.class_hash {
                debug!(
                    "Class {} already tracked (hash {:#x}), skipping declare",
                    artifact.name, tracked.class_hash
                );
                return tracked.class_hash;
            }
            debug!(
                "Class {} changed (tracked {:#x}, artifact {:#x}), declaring the new class",
                artifact.name, tracked.class_hash, artifact.class_hash
            );
        }

        batcher.enqueue(PendingCall::Declare {
            name: artifact.name.clone(),
            artifact: artifact.clone(),
        });
        self.classes.insert(
            artifact.name.clone(),
            TrackedClass {
                class_hash: artifact.class_hash,
                state: ClassState::Undeclared,
            },
        );
        artifact.class_hash
    }

    /// Record batch confirmation for `name`.
    pub fn mark_declared(&mut self, name: &ContractName) {
        if let Some(tracked) = self.classes.get_mut(name) {
            tracked.state = ClassState::Declared;
        }
    }

    pub fn class_hash_of(&self, name: &ContractName) -> Option<FieldElement> {
        self.classes.get(name).map(|t| t.class_hash)
    }

    pub fn state_of(&self, name: &ContractName) -> Option<ClassState> {
        self.classes.get(name).map(|t| t.state)
    }
}
