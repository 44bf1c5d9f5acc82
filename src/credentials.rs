//! Credential Pool
//!
//! Ordered API keys per provider with a cursor and a blacklist. A key marked
//! failed stays blacklisted for the lifetime of the pool; only an explicit
//! [`CredentialPool::reset`] brings it back. Keys are read once at construction
//! and never logged in full.

use crate::error::CredentialError;
use crate::provider::ProviderId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An API key. `Debug` prints a fingerprint only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `abcd…wxyz`, or `****` for short keys.
    pub fn fingerprint(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

struct PoolState {
    keys: Vec<Credential>,
    blacklisted: Vec<bool>,
    cursor: usize,
}

impl PoolState {
    fn is_active(&self, index: usize) -> bool {
        !self.blacklisted[index]
    }
}

pub struct CredentialPool {
    provider: ProviderId,
    env_var: String,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    /// Blank entries are dropped and duplicates collapsed, keeping first occurrence order.
    pub fn new(provider: ProviderId, env_var: impl Into<String>, keys: Vec<String>) -> Self {
        let mut unique: Vec<Credential> = Vec::new();
        for key in keys {
            let key = key.trim();
            if key.is_empty() || unique.iter().any(|k| k.expose() == key) {
                continue;
            }
            unique.push(Credential::new(key));
        }
        let blacklisted = vec![false; unique.len()];
        Self {
            provider,
            env_var: env_var.into(),
            state: Mutex::new(PoolState {
                keys: unique,
                blacklisted,
                cursor: 0,
            }),
        }
    }

    /// Parse a comma-separated key list as found in an environment variable.
    pub fn from_list(provider: ProviderId, env_var: impl Into<String>, list: &str) -> Self {
        Self::new(
            provider,
            env_var,
            list.split(',').map(str::to_string).collect(),
        )
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Key at the cursor. If it was blacklisted the cursor moves forward to the next active key.
    pub fn current(&self) -> Result<Credential, CredentialError> {
        let mut state = self.state.lock();
        self.ensure_configured(&state)?;
        let len = state.keys.len();
        for offset in 0..len {
            let index = (state.cursor + offset) % len;
            if state.is_active(index) {
                state.cursor = index;
                return Ok(state.keys[index].clone());
            }
        }
        Err(self.exhausted())
    }

    /// Advance to the next active key other than the current one, wrapping once.
    ///
    /// Returns `Exhausted` when the current key is the only active one, including
    /// a pool of one healthy key; [`current`](Self::current) still hands that key out.
    pub fn rotate(&self) -> Result<Credential, CredentialError> {
        let mut state = self.state.lock();
        self.ensure_configured(&state)?;
        let start = state.cursor;
        self.advance(&mut state, start)
    }

    /// Move away from `failed`, the key a call was actually using.
    ///
    /// Concurrent callers may share a failed key. If the cursor already points at
    /// a different active key that key is returned unchanged, so a second failure
    /// on the same key never skips past a healthy one.
    pub fn rotate_from(&self, failed: &Credential) -> Result<Credential, CredentialError> {
        let mut state = self.state.lock();
        self.ensure_configured(&state)?;
        let cursor = state.cursor;
        if state.is_active(cursor) && state.keys[cursor] != *failed {
            return Ok(state.keys[cursor].clone());
        }
        let start = state
            .keys
            .iter()
            .position(|k| k == failed)
            .unwrap_or(cursor);
        self.advance(&mut state, start)
    }

    /// Blacklist a key. Unknown keys are ignored.
    pub fn mark_failed(&self, key: &Credential) {
        let mut state = self.state.lock();
        if let Some(index) = state.keys.iter().position(|k| k == key) {
            if !state.blacklisted[index] {
                state.blacklisted[index] = true;
                tracing::warn!(
                    provider = %self.provider,
                    key = %key.fingerprint(),
                    "Blacklisted credential"
                );
            }
        }
    }

    /// Number of keys not blacklisted.
    pub fn available(&self) -> usize {
        let state = self.state.lock();
        state.blacklisted.iter().filter(|b| !**b).count()
    }

    pub fn len(&self) -> usize {
        self.state.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear the blacklist and return the cursor to the first key. Operator action only.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.blacklisted.iter_mut().for_each(|b| *b = false);
        state.cursor = 0;
        tracing::info!(provider = %self.provider, "Credential pool reset");
    }

    fn advance(&self, state: &mut PoolState, start: usize) -> Result<Credential, CredentialError> {
        let len = state.keys.len();
        for offset in 1..len {
            let index = (start + offset) % len;
            if state.is_active(index) {
                state.cursor = index;
                tracing::debug!(
                    provider = %self.provider,
                    key = %state.keys[index].fingerprint(),
                    "Rotated credential"
                );
                return Ok(state.keys[index].clone());
            }
        }
        Err(self.exhausted())
    }

    fn ensure_configured(&self, state: &PoolState) -> Result<(), CredentialError> {
        if state.keys.is_empty() {
            Err(CredentialError::NotConfigured {
                provider: self.provider,
                env_var: self.env_var.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn exhausted(&self) -> CredentialError {
        CredentialError::Exhausted {
            provider: self.provider,
        }
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("provider", &self.provider)
            .field("keys", &self.len())
            .field("available", &self.available())
            .finish()
    }
}

/// One pool per provider. Passed into the provider caller; never global.
#[derive(Debug, Default, Clone)]
pub struct CredentialStore {
    pools: HashMap<ProviderId, Arc<CredentialPool>>,
    env_vars: HashMap<ProviderId, String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every provider's key list once. `env_var` names the variable per provider.
    pub fn from_env(env_var: impl Fn(ProviderId) -> String) -> Self {
        let mut store = Self::new();
        for provider in ProviderId::ALL {
            let name = env_var(provider);
            match std::env::var(&name) {
                Ok(list) => {
                    let pool = CredentialPool::from_list(provider, name.clone(), &list);
                    tracing::debug!(provider = %provider, keys = pool.len(), "Loaded credentials");
                    store = store.with_pool(pool);
                }
                Err(_) => {
                    store.env_vars.insert(provider, name);
                }
            }
        }
        store
    }

    pub fn with_pool(mut self, pool: CredentialPool) -> Self {
        self.env_vars.insert(pool.provider, pool.env_var.clone());
        if !pool.is_empty() {
            self.pools.insert(pool.provider, Arc::new(pool));
        }
        self
    }

    pub fn pool(&self, provider: ProviderId) -> Result<Arc<CredentialPool>, CredentialError> {
        self.pools
            .get(&provider)
            .cloned()
            .ok_or_else(|| CredentialError::NotConfigured {
                provider,
                env_var: self
                    .env_vars
                    .get(&provider)
                    .cloned()
                    .unwrap_or_else(|| provider.default_env_var().to_string()),
            })
    }

    /// Providers with at least one key configured.
    pub fn configured(&self) -> Vec<ProviderId> {
        let mut providers: Vec<ProviderId> = self.pools.keys().copied().collect();
        providers.sort();
        providers
    }
}
