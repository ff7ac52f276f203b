//! The authoritative object → owner table.

use crate::host::{FULL_HEALTH, ObjectHost, Occupancy, PermissionProvider};
use crate::lease::{Lease, LeaseId, LeaseInfo};
use crate::schedule::Scheduler;
use crate::{ActorId, ClaimError, ObjectId, Result};
use policy::{ClaimPolicy, Permission};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use storage::{ClaimMapping, RIDABLES, ResourceStore};
use tracing::{debug, error, info, warn};

/// A claimed object and its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub object: ObjectId,
    pub owner: ActorId,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    owner: ActorId,
    /// Insertion sequence; iteration follows it.
    seq: u64,
}

struct State {
    claims: HashMap<ObjectId, Entry>,
    next_seq: u64,
    leases: HashMap<ObjectId, Lease>,
    store: ResourceStore,
}

impl State {
    fn owner(&self, object: ObjectId) -> Option<ActorId> {
        self.claims.get(&object).map(|e| e.owner)
    }

    fn count_for(&self, actor: ActorId) -> usize {
        self.claims.values().filter(|e| e.owner == actor).count()
    }

    fn ordered(&self) -> Vec<Claim> {
        let mut entries: Vec<_> = self.claims.iter().collect();
        entries.sort_by_key(|(_, e)| e.seq);
        entries
            .into_iter()
            .map(|(object, e)| Claim {
                object: *object,
                owner: e.owner,
            })
            .collect()
    }

    fn mapping(&self) -> ClaimMapping {
        self.claims
            .iter()
            .map(|(object, e)| (object.0, e.owner.0))
            .collect()
    }
}

struct Inner {
    policy: ClaimPolicy,
    host: Arc<dyn ObjectHost>,
    scheduler: Arc<dyn Scheduler>,
    permissions: Option<Arc<dyn PermissionProvider>>,
    state: Mutex<State>,
}

/// Builder for [`ClaimRegistry`].
pub struct ClaimRegistryBuilder {
    policy: ClaimPolicy,
    store: ResourceStore,
    host: Arc<dyn ObjectHost>,
    scheduler: Arc<dyn Scheduler>,
    permissions: Option<Arc<dyn PermissionProvider>>,
}

impl ClaimRegistryBuilder {
    pub fn permissions(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = Some(provider);
        self
    }

    /// Load the persisted table and bring the host in line with it.
    ///
    /// Objects the host reports as owned but that are missing from the table
    /// are handed back to the server. With leases enabled, every loaded claim
    /// gets a fresh countdown.
    pub fn build(self) -> Result<ClaimRegistry> {
        let mapping = self.store.read_mapping(RIDABLES)?;

        let mut claims = HashMap::with_capacity(mapping.len());
        let mut next_seq = 0;
        for (object, owner) in mapping {
            if owner == 0 {
                continue;
            }
            claims.insert(
                ObjectId(object),
                Entry {
                    owner: ActorId(owner),
                    seq: next_seq,
                },
            );
            next_seq += 1;
        }

        for (object, owner) in self.host.owned_objects() {
            if !owner.is_server() && !claims.contains_key(&object) {
                info!(%object, %owner, "resetting owner of unmanaged object");
                self.host.set_owner(object, ActorId::SERVER);
            }
        }

        let registry = ClaimRegistry {
            inner: Arc::new(Inner {
                policy: self.policy,
                host: self.host,
                scheduler: self.scheduler,
                permissions: self.permissions,
                state: Mutex::new(State {
                    claims,
                    next_seq,
                    leases: HashMap::new(),
                    store: self.store,
                }),
            }),
        };

        {
            let mut state = registry.state();
            info!(claims = state.claims.len(), "loaded claim table");
            if registry.inner.policy.lease.enabled {
                for claim in state.ordered() {
                    registry.arm_lease(&mut state, claim.object, claim.owner);
                }
            }
        }

        Ok(registry)
    }
}

/// Owns every claim and every lease.
///
/// Cloning is cheap and yields a handle to the same table. All mutations
/// take one lock covering the claims and the lease timers together, so an
/// expiring lease and a manual release cannot interleave.
#[derive(Clone)]
pub struct ClaimRegistry {
    inner: Arc<Inner>,
}

impl ClaimRegistry {
    pub fn builder(
        policy: ClaimPolicy,
        store: ResourceStore,
        host: Arc<dyn ObjectHost>,
        scheduler: Arc<dyn Scheduler>,
    ) -> ClaimRegistryBuilder {
        ClaimRegistryBuilder {
            policy,
            store,
            host,
            scheduler,
            permissions: None,
        }
    }

    pub fn policy(&self) -> &ClaimPolicy {
        &self.inner.policy
    }

    /// Claim an unowned object for `actor`.
    pub fn claim(&self, object: ObjectId, actor: ActorId) -> Result<()> {
        if actor.is_server() {
            return Err(ClaimError::InvalidActor(actor));
        }

        let mut state = self.state();
        let host = &self.inner.host;

        let Some(attribute) = host.owner_of(object) else {
            return Err(ClaimError::NotFound(format!("object {object}")));
        };

        match state.owner(object) {
            Some(owner) if owner == actor => {
                return Err(ClaimError::AlreadyClaimed { object, actor });
            }
            Some(owner) => return Err(ClaimError::OwnedByOther { object, owner }),
            None => {}
        }

        if attribute == actor {
            return Err(ClaimError::AlreadyClaimed { object, actor });
        }
        if !attribute.is_server() {
            return Err(ClaimError::OwnedByOther {
                object,
                owner: attribute,
            });
        }

        self.check_limit(&mut state, actor)?;

        // Always a fresh entry, never an in-place update.
        state.claims.remove(&object);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.claims.insert(object, Entry { owner: actor, seq });
        host.set_owner(object, actor);

        if self.inner.policy.access.restore_health_on_claim {
            host.set_health(object, FULL_HEALTH);
        }
        if self.inner.policy.lease.enabled {
            self.arm_lease(&mut state, object, actor);
        }

        Self::persist(&state);
        info!(%object, owner = %actor, "claimed");
        Ok(())
    }

    /// Release an object held by `actor`.
    pub fn release(&self, object: ObjectId, actor: ActorId) -> Result<()> {
        let mut state = self.state();
        if state.owner(object) != Some(actor) {
            return Err(ClaimError::NotOwner { object, actor });
        }

        self.remove_claim(&mut state, object, true);
        info!(%object, owner = %actor, "released");
        Ok(())
    }

    /// Release an object regardless of who holds it.
    ///
    /// Returns the previous owner, or `None` if the object was not claimed.
    pub fn force_release(&self, object: ObjectId) -> Option<ActorId> {
        let mut state = self.state();
        let previous = self.remove_claim(&mut state, object, true);
        if let Some(owner) = previous {
            info!(%object, %owner, "force released");
        }
        previous
    }

    /// A new object appeared in the host.
    ///
    /// An owner attribute the registry does not know about is reset to the
    /// server. Returns `true` if it was.
    pub fn on_spawned(&self, object: ObjectId) -> bool {
        let state = self.state();
        let host = &self.inner.host;
        match host.owner_of(object) {
            Some(owner) if !owner.is_server() && state.owner(object).is_none() => {
                info!(%object, %owner, "resetting owner of unmanaged object");
                host.set_owner(object, ActorId::SERVER);
                true
            }
            _ => false,
        }
    }

    /// The object was destroyed in the host: forget it.
    pub fn on_destroyed(&self, object: ObjectId) -> Option<ActorId> {
        let mut state = self.state();
        let previous = self.remove_claim(&mut state, object, false);
        if let Some(owner) = previous {
            debug!(%object, %owner, "claimed object destroyed");
        }
        previous
    }

    pub fn lookup(&self, object: ObjectId) -> Option<ActorId> {
        self.state().owner(object)
    }

    /// The actor's earliest surviving claim.
    pub fn find_by_owner(&self, actor: ActorId) -> Option<ObjectId> {
        let state = self.state();
        state
            .claims
            .iter()
            .filter(|(_, e)| e.owner == actor)
            .min_by_key(|(_, e)| e.seq)
            .map(|(object, _)| *object)
    }

    /// All claims in the order they were made.
    pub fn claims(&self) -> Vec<Claim> {
        self.state().ordered()
    }

    pub fn len(&self) -> usize {
        self.state().claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().claims.is_empty()
    }

    pub fn claim_count(&self, actor: ActorId) -> usize {
        self.state().count_for(actor)
    }

    pub fn lease(&self, object: ObjectId) -> Option<LeaseInfo> {
        self.state().leases.get(&object).map(|l| l.info().clone())
    }

    pub fn lease_count(&self) -> usize {
        self.state().leases.len()
    }

    /// Whether the actor may not take another claim.
    pub fn is_at_limit(&self, actor: ActorId) -> bool {
        let mut state = self.state();
        self.check_limit(&mut state, actor).is_err()
    }

    /// The limit that applies to the actor.
    pub fn threshold_for(&self, actor: ActorId) -> u32 {
        self.inner.policy.limits.threshold(self.is_privileged(actor))
    }

    /// Ask the permission provider.
    pub fn has_permission(&self, actor: ActorId, permission: Permission) -> Result<bool> {
        self.inner
            .permissions
            .as_ref()
            .map(|p| p.has_permission(actor, permission))
            .ok_or(ClaimError::ProviderUnavailable("permissions"))
    }

    fn is_privileged(&self, actor: ActorId) -> bool {
        match self.has_permission(actor, Permission::Vip) {
            Ok(privileged) => privileged,
            Err(e) => {
                debug!(%actor, "treating as non-privileged: {e}");
                false
            }
        }
    }

    /// Drop claims whose object the host no longer knows.
    pub fn purge_invalid(&self) -> usize {
        let host = self.inner.host.clone();
        self.purge_invalid_with(|object| host.exists(object))
    }

    /// Drop claims for which `exists` returns false.
    pub fn purge_invalid_with(&self, exists: impl Fn(ObjectId) -> bool) -> usize {
        let mut state = self.state();
        Self::purge_locked(&mut state, exists)
    }

    /// Forget every claim and lease.
    pub fn reset(&self) {
        let mut state = self.state();
        let host = &self.inner.host;
        for object in state.claims.keys() {
            if host.exists(*object) {
                host.set_owner(*object, ActorId::SERVER);
            }
        }
        let cleared = state.claims.len();
        state.claims.clear();
        state.leases.clear();
        Self::persist(&state);
        info!(cleared, "claim table reset");
    }

    /// Orderly shutdown.
    ///
    /// With leases enabled ownership must not survive a restart, so the
    /// table is reset. Otherwise pending timers are cancelled and the table
    /// is written one final time.
    pub fn shutdown(&self) {
        if self.inner.policy.lease.enabled {
            self.reset();
            return;
        }
        let mut state = self.state();
        state.leases.clear();
        Self::persist(&state);
        debug!("claim registry shut down");
    }

    fn check_limit(&self, state: &mut State, actor: ActorId) -> Result<()> {
        let host = self.inner.host.clone();
        Self::purge_locked(state, |object| host.exists(object));

        let limits = &self.inner.policy.limits;
        if !limits.enabled {
            return Ok(());
        }

        let count = state.count_for(actor);
        let privileged = self.is_privileged(actor);
        debug!(%actor, count, privileged, "checking claim limit");
        if limits.is_at_limit(count, privileged) {
            return Err(ClaimError::LimitReached {
                current: count,
                threshold: limits.threshold(privileged),
            });
        }
        Ok(())
    }

    fn purge_locked(state: &mut State, exists: impl Fn(ObjectId) -> bool) -> usize {
        let stale: Vec<ObjectId> = state
            .claims
            .keys()
            .copied()
            .filter(|object| !exists(*object))
            .collect();

        for object in &stale {
            state.claims.remove(object);
            state.leases.remove(object);
            debug!(%object, "purged claim on missing object");
        }
        if !stale.is_empty() {
            Self::persist(state);
        }
        stale.len()
    }

    /// Remove a claim and its lease. Persists when something was removed.
    fn remove_claim(
        &self,
        state: &mut State,
        object: ObjectId,
        reset_owner: bool,
    ) -> Option<ActorId> {
        state.leases.remove(&object);
        let entry = state.claims.remove(&object)?;

        if reset_owner && self.inner.host.exists(object) {
            self.inner.host.set_owner(object, ActorId::SERVER);
        }
        Self::persist(state);
        Some(entry.owner)
    }

    fn arm_lease(&self, state: &mut State, object: ObjectId, owner: ActorId) {
        let duration = self.inner.policy.lease.release_after();
        let info = LeaseInfo::new(object, owner, duration);
        let lease_id = info.id;

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let timer = self.inner.scheduler.schedule(
            duration,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    ClaimRegistry { inner }.expire(object, lease_id);
                }
            }),
        );

        // Replacing drops, and so cancels, any previous lease.
        state.leases.insert(object, Lease::new(info, timer));
        debug!(%object, %owner, %lease_id, ?duration, "lease armed");
    }

    fn expire(&self, object: ObjectId, lease_id: LeaseId) {
        let mut state = self.state();

        if state.leases.get(&object).map(|l| l.info().id) != Some(lease_id) {
            debug!(%object, %lease_id, "ignoring stale lease expiry");
            return;
        }
        let Some(lease) = state.leases.remove(&object).map(Lease::fired) else {
            return;
        };
        let owner = lease.owner;

        if state.owner(object) != Some(owner) {
            warn!(%object, %owner, "lease expired for a claim that changed hands");
            return;
        }

        let occupancy = self.inner.host.occupancy(object);
        let release_while_occupied = self.inner.policy.lease.release_while_occupied;
        match occupancy {
            Occupancy::Occupied(rider) if rider == owner && !release_while_occupied => {
                self.arm_lease(&mut state, object, owner);
                info!(%object, %owner, "owner still riding, lease renewed");
            }
            _ => {
                self.remove_claim(&mut state, object, true);
                info!(%object, %owner, ?occupancy, "lease expired, claim released");
            }
        }
    }

    fn persist(state: &State) {
        if let Err(e) = state.store.write_mapping(RIDABLES, &state.mapping()) {
            error!("failed to persist claim table: {e}");
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
