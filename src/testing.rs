//! In-memory adapters for engine tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::adapter::{InventorySource, SyncTarget};
use crate::error::{ApiError, Result};
use crate::planner::{BranchRef, ChangeOperation};
use crate::resource::{FieldProfile, RawRecord, ResourceKind, System};

/// Source returning a fixed record list.
pub struct FakeSource {
    system: System,
    records: Vec<RawRecord>,
    scopes: Mutex<Vec<Option<String>>>,
}

impl FakeSource {
    pub fn new(system: System, records: Vec<RawRecord>) -> Self {
        Self {
            system,
            records,
            scopes: Mutex::new(vec![]),
        }
    }

    /// Branch names each read was scoped to.
    pub fn scopes(&self) -> Vec<Option<String>> {
        self.scopes.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventorySource for FakeSource {
    fn system(&self) -> System {
        self.system
    }

    async fn fetch_records(
        &self,
        kinds: &BTreeSet<ResourceKind>,
        scope: Option<&BranchRef>,
    ) -> Result<Vec<RawRecord>> {
        self.scopes
            .lock()
            .unwrap()
            .push(scope.map(|b| b.name.clone()));
        Ok(self
            .records
            .iter()
            .filter(|r| kinds.contains(&r.kind))
            .cloned()
            .collect())
    }
}

enum Failure {
    Permanent,
    Transient(u32),
}

/// Target recording every apply call, with failure injection by identity.
pub struct FakeTarget {
    system: System,
    profile: FieldProfile,
    failures: Mutex<BTreeMap<String, Failure>>,
    calls: Mutex<Vec<(String, String)>>,
    applied: Mutex<Vec<String>>,
}

impl FakeTarget {
    pub fn new(system: System) -> Self {
        Self {
            system,
            profile: FieldProfile::all(),
            failures: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(vec![]),
            applied: Mutex::new(vec![]),
        }
    }

    pub fn with_profile(mut self, profile: FieldProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Every call for `identity_key` fails with a rejected request.
    pub fn fail_permanently(self, identity_key: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(identity_key.to_string(), Failure::Permanent);
        self
    }

    /// The first `times` calls for `identity_key` fail with a 503.
    pub fn fail_transiently(self, identity_key: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(identity_key.to_string(), Failure::Transient(times));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Branch name of every call, in order.
    pub fn call_branches(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }

    pub fn applied_keys(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncTarget for FakeTarget {
    fn system(&self) -> System {
        self.system
    }

    fn managed_fields(&self) -> FieldProfile {
        self.profile.clone()
    }

    async fn apply(&self, op: &ChangeOperation, branch: &BranchRef) -> std::result::Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((op.identity_key.clone(), branch.name.clone()));

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&op.identity_key) {
            Some(Failure::Permanent) => {
                return Err(ApiError::Rejected {
                    system: self.system,
                    status: 422,
                    message: format!("{} rejected", op.identity_key),
                });
            }
            Some(Failure::Transient(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                return Err(ApiError::Server {
                    system: self.system,
                    status: 503,
                    message: String::from("unavailable"),
                });
            }
            _ => {}
        }
        drop(failures);

        self.applied.lock().unwrap().push(op.identity_key.clone());
        Ok(())
    }
}
