//! Run-scoped registry of contract addresses and class hashes.
//!
//! The planner writes into it as soon as an address is computed, so later
//! requests in the same run resolve references without waiting for
//! submission. Seeded from the manifest at run start for cross-run lookups.

use std::collections::HashMap;

use starknet::core::types::FieldElement;

use crate::types::ContractName;

#[derive(Debug, Clone, Copy, Default)]
struct RegisteredContract {
    address: Option<FieldElement>,
    class_hash: Option<FieldElement>,
}

/// Name → address/class-hash table for one deployment run.
#[derive(Debug, Default)]
pub struct RunRegistry {
    entries: HashMap<ContractName, RegisteredContract>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_address(&mut self, name: ContractName, address: FieldElement) {
        self.entries.entry(name).or_default().address = Some(address);
    }

    pub fn record_class_hash(&mut self, name: ContractName, class_hash: FieldElement) {
        self.entries.entry(name).or_default().class_hash = Some(class_hash);
    }

    pub fn address_of(&self, name: &ContractName) -> Option<FieldElement> {
        self.entries.get(name).and_then(|e| e.address)
    }

    pub fn class_hash_of(&self, name: &ContractName) -> Option<FieldElement> {
        self.entries.get(name).and_then(|e| e.class_hash)
    }
}
