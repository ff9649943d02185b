// Exclusive hardware resources: one audio output channel and one camera device for the whole player.
// Ownership is a lease guard; dropping the guard releases the lease on every exit path.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    AudioOutput,
    CameraDevice,
}

/// Identifies one acquisition. The host keys its media handles by lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LeaseId(u64);

/// A lease that ended. `revoked` is set when a newer acquisition took the resource over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRelease {
    pub kind: ResourceKind,
    pub lease: LeaseId,
    pub revoked: bool,
}

#[derive(Debug, Default)]
struct ArbiterState {
    audio: Option<LeaseId>,
    camera: Option<LeaseId>,
    next_lease: u64,
    released: Vec<ResourceRelease>,
}

impl ArbiterState {
    fn slot(&mut self, kind: ResourceKind) -> &mut Option<LeaseId> {
        match kind {
            ResourceKind::AudioOutput => &mut self.audio,
            ResourceKind::CameraDevice => &mut self.camera,
        }
    }
}

/// Hands out at most one live lease per resource kind.
///
/// Single-threaded by construction (`Rc`), matching the host event loop.
#[derive(Debug, Clone, Default)]
pub struct ResourceArbiter {
    state: Rc<RefCell<ArbiterState>>,
}

impl ResourceArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `kind`. A previous holder is released first; its guard becomes inert.
    pub fn acquire(&self, kind: ResourceKind) -> ResourceGuard {
        let mut state = self.state.borrow_mut();
        state.next_lease += 1;
        let lease = LeaseId(state.next_lease);

        if let Some(previous) = state.slot(kind).replace(lease) {
            tracing::warn!("{:?} lease {} revoked by lease {}", kind, previous.0, lease.0);
            state.released.push(ResourceRelease {
                kind,
                lease: previous,
                revoked: true,
            });
        }

        ResourceGuard {
            kind,
            lease,
            state: Rc::downgrade(&self.state),
        }
    }

    pub fn holder(&self, kind: ResourceKind) -> Option<LeaseId> {
        *self.state.borrow_mut().slot(kind)
    }

    /// Releases since the last drain, in the order they happened.
    pub fn drain_releases(&self) -> Vec<ResourceRelease> {
        std::mem::take(&mut self.state.borrow_mut().released)
    }
}

/// Proof of holding a resource. Releases on drop.
#[derive(Debug)]
pub struct ResourceGuard {
    kind: ResourceKind,
    lease: LeaseId,
    state: Weak<RefCell<ArbiterState>>,
}

impl ResourceGuard {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn lease(&self) -> LeaseId {
        self.lease
    }

    /// False once a newer acquisition has taken the resource over.
    pub fn is_current(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        if let Ok(mut held) = state.try_borrow_mut() {
            return *held.slot(self.kind) == Some(self.lease);
        }
        false
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let Ok(mut state) = state.try_borrow_mut() else {
            tracing::error!("{:?} lease {} dropped while arbiter busy", self.kind, self.lease.0);
            return;
        };
        let slot = state.slot(self.kind);
        if *slot == Some(self.lease) {
            *slot = None;
            state.released.push(ResourceRelease {
                kind: self.kind,
                lease: self.lease,
                revoked: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_releases_lease() {
        let arbiter = ResourceArbiter::new();
        let guard = arbiter.acquire(ResourceKind::CameraDevice);
        let lease = guard.lease();
        assert_eq!(arbiter.holder(ResourceKind::CameraDevice), Some(lease));

        drop(guard);
        assert_eq!(arbiter.holder(ResourceKind::CameraDevice), None);
        assert_eq!(
            arbiter.drain_releases(),
            vec![ResourceRelease {
                kind: ResourceKind::CameraDevice,
                lease,
                revoked: false
            }]
        );
    }

    #[test]
    fn second_acquire_revokes_first() {
        let arbiter = ResourceArbiter::new();
        let first = arbiter.acquire(ResourceKind::AudioOutput);
        let second = arbiter.acquire(ResourceKind::AudioOutput);

        assert!(!first.is_current());
        assert!(second.is_current());

        // The stale guard must not release the newer lease.
        drop(first);
        assert_eq!(arbiter.holder(ResourceKind::AudioOutput), Some(second.lease()));

        let releases = arbiter.drain_releases();
        assert_eq!(releases.len(), 1);
        assert!(releases[0].revoked);
        assert!(arbiter.drain_releases().is_empty());
    }

    #[test]
    fn kinds_are_independent() {
        let arbiter = ResourceArbiter::new();
        let audio = arbiter.acquire(ResourceKind::AudioOutput);
        let camera = arbiter.acquire(ResourceKind::CameraDevice);
        assert!(audio.is_current());
        assert!(camera.is_current());
        assert!(arbiter.drain_releases().is_empty());
    }

    #[test]
    fn guard_outliving_arbiter_is_not_current() {
        let arbiter = ResourceArbiter::new();
        let guard = arbiter.acquire(ResourceKind::CameraDevice);
        drop(arbiter);
        assert!(!guard.is_current());
    }
}
