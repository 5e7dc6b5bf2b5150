#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The capability/lease model that gates every privileged operation (spec
//! §3.1 CapabilityLease, I6, §5 "at most one WRITE lease for the durable
//! workspace may be outstanding").
//!
//! Leases are owned by the orchestrator (§3.3); principals hold only a weak
//! reference (the lease ID). This crate is the orchestrator's private
//! bookkeeping for that ownership — `director-runtime` is the only expected
//! caller.

use director_core::{CapabilityLease, DirectorError, Mood};
use globset::Glob;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Parameters for granting a new lease; grouped to keep `grant`'s signature
/// manageable as the scope/constraint set grows.
#[derive(Debug, Clone)]
pub struct LeaseRequest {
    /// The run requesting the lease.
    pub run_id: Uuid,
    /// The user the run acts on behalf of.
    pub user_id: String,
    /// The mood active when the request is made.
    pub mood: Mood,
    /// The syscall class requested (e.g. `read`, `write`, `net`, `exec`).
    pub syscall_class: String,
    /// Glob patterns (paths or hosts) the lease is restricted to.
    pub scope: Vec<String>,
    /// Time-to-live in milliseconds.
    pub ttl_ms: u64,
    /// Metered budget, if the syscall class is metered.
    pub budget: Option<u64>,
    /// Free-form constraints beyond scope.
    pub constraints: std::collections::BTreeMap<String, String>,
}

/// The syscall class reserved for the fresh, commit-time workspace write;
/// at most one lease of this class may be outstanding at a time (§5: "at
/// most one WRITE lease for the durable workspace may be outstanding").
/// This is the serialization point, not execution-phase sandbox writes —
/// see [`EXECUTION_WRITE_CLASS`].
pub const WRITE_CLASS: &str = "write";

/// The syscall class for execution-phase sandbox writes (`apply_patch`
/// during `executing`). Spec §4.6 allows multiple patches per run, and
/// §5/§8.4 scenario 6 serialize only the commit-time workspace lease, not
/// in-sandbox writes during execution — so this class is exempt from
/// [`WRITE_CLASS`]'s single-outstanding-writer rule.
pub const EXECUTION_WRITE_CLASS: &str = "exec_write";

/// The orchestrator's live lease bookkeeping. One registry per Director instance.
#[derive(Default)]
pub struct LeaseRegistry {
    leases: RwLock<HashMap<Uuid, CapabilityLease>>,
    write_holder: RwLock<Option<Uuid>>,
}

impl LeaseRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants a new lease.
    ///
    /// # Errors
    /// Returns [`DirectorError::CapabilityDenied`] if `request.syscall_class`
    /// is [`WRITE_CLASS`] and a non-revoked write lease is already outstanding
    /// (the serialized-write-lease rule in spec §5).
    pub async fn grant(
        &self,
        request: LeaseRequest,
        issued_seq: u64,
        issued_at_ms: i64,
    ) -> Result<CapabilityLease, DirectorError> {
        if request.syscall_class == WRITE_CLASS {
            let mut holder = self.write_holder.write().await;
            if let Some(existing) = *holder {
                let leases = self.leases.read().await;
                if leases.get(&existing).is_some_and(|l| !l.revoked) {
                    return Err(DirectorError::CapabilityDenied {
                        syscall_class: WRITE_CLASS.to_string(),
                    });
                }
            }
            let lease_id = Uuid::new_v4();
            *holder = Some(lease_id);
            drop(holder);
            return Ok(self.insert(lease_id, request, issued_seq, issued_at_ms).await);
        }

        let lease_id = Uuid::new_v4();
        Ok(self.insert(lease_id, request, issued_seq, issued_at_ms).await)
    }

    async fn insert(
        &self,
        lease_id: Uuid,
        request: LeaseRequest,
        issued_seq: u64,
        issued_at_ms: i64,
    ) -> CapabilityLease {
        let lease = CapabilityLease {
            lease_id,
            run_id: request.run_id,
            user_id: request.user_id,
            mood: request.mood,
            syscall_class: request.syscall_class,
            scope: request.scope,
            ttl_ms: request.ttl_ms,
            budget: request.budget,
            constraints: request.constraints,
            issued_seq,
            issued_at_ms,
            revoked: false,
        };
        self.leases.write().await.insert(lease_id, lease.clone());
        info!(lease_id = %lease_id, run_id = %lease.run_id, class = %lease.syscall_class, "capability lease granted");
        lease
    }

    /// Revokes a lease immediately. Idempotent.
    pub async fn revoke(&self, lease_id: Uuid) {
        let mut leases = self.leases.write().await;
        if let Some(lease) = leases.get_mut(&lease_id) {
            lease.revoked = true;
            warn!(lease_id = %lease_id, "capability lease revoked");
        }
        drop(leases);
        let mut holder = self.write_holder.write().await;
        if *holder == Some(lease_id) {
            *holder = None;
        }
    }

    /// Checks that `lease_id` authorizes `syscall_class` against `target`
    /// (a path or host, matched against the lease's scope globs) at time
    /// `now_ms`.
    ///
    /// # Errors
    /// Returns [`DirectorError::CapabilityDenied`] if the lease is missing,
    /// revoked, expired, wrong class, or `target` is outside scope (I6:
    /// "no lease, no operation").
    pub async fn check(
        &self,
        lease_id: Uuid,
        syscall_class: &str,
        target: &str,
        now_ms: i64,
    ) -> Result<(), DirectorError> {
        let leases = self.leases.read().await;
        let lease = leases
            .get(&lease_id)
            .ok_or_else(|| DirectorError::CapabilityDenied {
                syscall_class: syscall_class.to_string(),
            })?;

        if lease.revoked
            || lease.syscall_class != syscall_class
            || now_ms.saturating_sub(lease.issued_at_ms) as u64 > lease.ttl_ms
            || !scope_allows(&lease.scope, target)
        {
            return Err(DirectorError::CapabilityDenied {
                syscall_class: syscall_class.to_string(),
            });
        }
        Ok(())
    }

    /// Returns a clone of the lease record, if present.
    pub async fn get(&self, lease_id: Uuid) -> Option<CapabilityLease> {
        self.leases.read().await.get(&lease_id).cloned()
    }

    /// Revokes every lease belonging to `run_id`; called when a run reaches
    /// a terminal state, since leases consumed during execution do not
    /// carry over (spec §4.6 commit gating rules).
    pub async fn revoke_all_for_run(&self, run_id: Uuid) {
        let ids: Vec<Uuid> = self
            .leases
            .read()
            .await
            .values()
            .filter(|l| l.run_id == run_id && !l.revoked)
            .map(|l| l.lease_id)
            .collect();
        for id in ids {
            self.revoke(id).await;
        }
    }
}

fn scope_allows(scope: &[String], target: &str) -> bool {
    scope.iter().any(|pattern| {
        Glob::new(pattern)
            .map(|g| g.compile_matcher().is_match(target))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(class: &str) -> LeaseRequest {
        LeaseRequest {
            run_id: Uuid::new_v4(),
            user_id: "u1".into(),
            mood: Mood::Calm,
            syscall_class: class.into(),
            scope: vec!["/workspace/**".into()],
            ttl_ms: 60_000,
            budget: None,
            constraints: Default::default(),
        }
    }

    #[tokio::test]
    async fn grants_and_checks_within_scope() {
        let registry = LeaseRegistry::new();
        let lease = registry.grant(request("read"), 1, 0).await.unwrap();
        assert!(registry
            .check(lease.lease_id, "read", "/workspace/a.rs", 10)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn denies_out_of_scope_target() {
        let registry = LeaseRegistry::new();
        let lease = registry.grant(request("read"), 1, 0).await.unwrap();
        assert!(registry
            .check(lease.lease_id, "read", "/etc/passwd", 10)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn denies_expired_lease() {
        let registry = LeaseRegistry::new();
        let lease = registry.grant(request("read"), 1, 0).await.unwrap();
        assert!(registry
            .check(lease.lease_id, "read", "/workspace/a.rs", 100_000)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn revoked_lease_is_denied() {
        let registry = LeaseRegistry::new();
        let lease = registry.grant(request("read"), 1, 0).await.unwrap();
        registry.revoke(lease.lease_id).await;
        assert!(registry
            .check(lease.lease_id, "read", "/workspace/a.rs", 10)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn only_one_outstanding_write_lease() {
        let registry = LeaseRegistry::new();
        let first = registry.grant(request(WRITE_CLASS), 1, 0).await.unwrap();
        assert!(registry.grant(request(WRITE_CLASS), 2, 0).await.is_err());
        registry.revoke(first.lease_id).await;
        assert!(registry.grant(request(WRITE_CLASS), 3, 0).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_all_for_run_clears_leases() {
        let registry = LeaseRegistry::new();
        let req = request("read");
        let run_id = req.run_id;
        let lease = registry.grant(req, 1, 0).await.unwrap();
        registry.revoke_all_for_run(run_id).await;
        assert!(registry.get(lease.lease_id).await.unwrap().revoked);
    }
}
