// crates/decision-link-core/src/runtime/store.rs
// ============================================================================
// Module: Decision Link In-Memory Store
// Description: Mutex-guarded token store for tests and local runs.
// Purpose: Provide a reference TokenStore without external dependencies.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryTokenStore`] keeps every token row in a map guarded by a single
//! mutex. Each operation runs entirely under the lock, which makes the
//! consume check-and-set atomic. Rows do not survive a restart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::ActionKind;
use crate::core::SubjectId;
use crate::core::Timestamp;
use crate::core::TokenId;
use crate::core::TokenRecord;
use crate::core::TokenState;
use crate::interfaces::ConsumeError;
use crate::interfaces::IssueReceipt;
use crate::interfaces::StoreError;
use crate::interfaces::TokenStore;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Rows plus the active index, guarded together.
#[derive(Debug, Default)]
struct TokenTable {
    /// Token rows keyed by token id.
    rows: BTreeMap<String, TokenRecord>,
    /// Active token id keyed by subject and action.
    active: BTreeMap<(String, ActionKind), String>,
}

impl TokenTable {
    /// Marks the active row for a pair as revoked and returns its id.
    fn revoke_active(
        &mut self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
        now: Timestamp,
    ) -> Result<Option<TokenId>, StoreError> {
        let key = (subject_id.as_str().to_string(), action_kind);
        let Some(token_key) = self.active.remove(&key) else {
            return Ok(None);
        };
        let row = self
            .rows
            .get_mut(&token_key)
            .ok_or_else(|| StoreError::Corrupt("active index references missing row".to_string()))?;
        row.state = TokenState::Revoked;
        row.revoked_at = Some(now);
        Ok(Some(row.token_id.clone()))
    }
}

/// In-memory token store for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenStore {
    /// Token table protected by a mutex.
    table: Arc<Mutex<TokenTable>>,
}

impl InMemoryTokenStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the table lock, mapping poisoning to a transient failure.
    fn lock(&self) -> Result<MutexGuard<'_, TokenTable>, StoreError> {
        self.table
            .lock()
            .map_err(|_| StoreError::Unavailable("token store mutex poisoned".to_string()))
    }
}

impl TokenStore for InMemoryTokenStore {
    fn issue(&self, record: &TokenRecord) -> Result<IssueReceipt, StoreError> {
        record.validate_new().map_err(StoreError::Invalid)?;
        let mut table = self.lock()?;
        let token_key = record.token_id.as_str().to_string();
        if table.rows.contains_key(&token_key) {
            return Err(StoreError::Conflict("token id already issued".to_string()));
        }
        let revoked = table.revoke_active(&record.subject_id, record.action_kind, record.issued_at)?;
        table
            .active
            .insert((record.subject_id.as_str().to_string(), record.action_kind), token_key.clone());
        table.rows.insert(token_key, record.clone());
        drop(table);
        Ok(IssueReceipt {
            revoked,
        })
    }

    fn try_consume(
        &self,
        token_id: &TokenId,
        now: Timestamp,
    ) -> Result<TokenRecord, ConsumeError> {
        let mut table = self.lock()?;
        let row = table.rows.get_mut(token_id.as_str()).ok_or(ConsumeError::NotFound)?;
        match row.state {
            TokenState::Active if now < row.expires_at => {
                row.state = TokenState::Consumed;
                row.consumed_at = Some(now);
                let consumed = row.clone();
                table.active.remove(&(consumed.subject_id.as_str().to_string(), consumed.action_kind));
                drop(table);
                Ok(consumed)
            }
            TokenState::Active | TokenState::Expired => Err(ConsumeError::Expired {
                expires_at: row.expires_at,
            }),
            TokenState::Consumed => Err(ConsumeError::AlreadyConsumed {
                consumed_at: row.consumed_at,
            }),
            TokenState::Revoked => Err(ConsumeError::Revoked {
                revoked_at: row.revoked_at,
            }),
        }
    }

    fn revoke(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
        now: Timestamp,
    ) -> Result<Option<TokenId>, StoreError> {
        self.lock()?.revoke_active(subject_id, action_kind, now)
    }

    fn load(&self, token_id: &TokenId) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.lock()?.rows.get(token_id.as_str()).cloned())
    }

    fn active_for(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let table = self.lock()?;
        let key = (subject_id.as_str().to_string(), action_kind);
        Ok(table.active.get(&key).and_then(|token_key| table.rows.get(token_key)).cloned())
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared token store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedTokenStore {
    /// Inner store implementation.
    inner: Arc<dyn TokenStore + Send + Sync>,
}

impl std::fmt::Debug for SharedTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTokenStore").finish_non_exhaustive()
    }
}

impl SharedTokenStore {
    /// Wraps a token store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl TokenStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn TokenStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl TokenStore for SharedTokenStore {
    fn issue(&self, record: &TokenRecord) -> Result<IssueReceipt, StoreError> {
        self.inner.issue(record)
    }

    fn try_consume(
        &self,
        token_id: &TokenId,
        now: Timestamp,
    ) -> Result<TokenRecord, ConsumeError> {
        self.inner.try_consume(token_id, now)
    }

    fn revoke(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
        now: Timestamp,
    ) -> Result<Option<TokenId>, StoreError> {
        self.inner.revoke(subject_id, action_kind, now)
    }

    fn load(&self, token_id: &TokenId) -> Result<Option<TokenRecord>, StoreError> {
        self.inner.load(token_id)
    }

    fn active_for(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
    ) -> Result<Option<TokenRecord>, StoreError> {
        self.inner.active_for(subject_id, action_kind)
    }
}
