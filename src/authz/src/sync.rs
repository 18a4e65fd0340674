//! Thread-shared authority
//!
//! The authority itself is not synchronized. [`SharedAuthority`] puts it
//! behind a read/write lock: queries and exports share the read side,
//! every mutation takes the write side.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::authority::Authority;
use crate::error::Result;
use crate::types::EntityId;

/// Cloneable handle to one authority
#[derive(Debug, Clone, Default)]
pub struct SharedAuthority {
    inner: Arc<RwLock<Authority>>,
}

impl SharedAuthority {
    pub fn new(authority: Authority) -> Self {
        Self {
            inner: Arc::new(RwLock::new(authority)),
        }
    }

    /// Runs `f` under the shared lock
    pub fn read<R>(&self, f: impl FnOnce(&Authority) -> R) -> R {
        f(&*self.inner.read())
    }

    /// Runs `f` under the exclusive lock
    pub fn write<R>(&self, f: impl FnOnce(&mut Authority) -> R) -> R {
        f(&mut *self.inner.write())
    }

    pub fn subject_has_permission(
        &self,
        sid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<bool> {
        self.read(|auth| auth.subject_has_permission(sid, node, payload))
    }

    pub fn role_has_permission(
        &self,
        rid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<bool> {
        self.read(|auth| auth.role_has_permission(rid, node, payload))
    }

    /// Copy of the current authority
    pub fn snapshot(&self) -> Authority {
        self.inner.read().clone()
    }
}

impl From<Authority> for SharedAuthority {
    fn from(authority: Authority) -> Self {
        Self::new(authority)
    }
}
