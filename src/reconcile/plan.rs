use super::store::ManagedObject;
use crate::fleet::ClusterSecretSpec;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneDisposition {
    Execute,
    /// The cycle's input was degraded; prune candidates are reported but
    /// left in place.
    Deferred,
}

/// Work for one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub apply: Vec<ClusterSecretSpec>,
    pub prune: Vec<String>,
    pub prune_disposition: PruneDisposition,
}

impl ReconcilePlan {
    /// Desired objects are always applied. Managed objects missing from the
    /// desired set become prune candidates, executed only when `degraded` is
    /// false.
    pub fn build(
        desired: Vec<ClusterSecretSpec>,
        existing: &[ManagedObject],
        degraded: bool,
    ) -> Self {
        let apply: BTreeMap<String, ClusterSecretSpec> = desired
            .into_iter()
            .map(|object| (object.name.clone(), object))
            .collect();
        let prune: BTreeSet<String> = existing
            .iter()
            .filter(|object| object.managed && !apply.contains_key(&object.name))
            .map(|object| object.name.clone())
            .collect();
        Self {
            apply: apply.into_values().collect(),
            prune: prune.into_iter().collect(),
            prune_disposition: if degraded {
                PruneDisposition::Deferred
            } else {
                PruneDisposition::Execute
            },
        }
    }

    pub fn prunes_allowed(&self) -> bool {
        self.prune_disposition == PruneDisposition::Execute
    }
}

/// Summary of an executed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub applied: usize,
    pub pruned: usize,
    pub deferred_prunes: usize,
    pub degraded: bool,
}
