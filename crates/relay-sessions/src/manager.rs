use std::time::Instant;

use dashmap::{DashMap, DashSet};
use relay_core::types::{ConversationTurn, UserId};
use tracing::{debug, instrument};

use crate::types::CacheLimits;

struct Entry {
    turns: Vec<ConversationTurn>,
    last_active: Instant,
}

/// In-memory, per-user conversation histories.
///
/// Every history starts with exactly one system turn holding the configured
/// instruction. Histories only grow until the user resets, the entry idles
/// past `idle_ttl`, or it is evicted to make room under `max_users`.
///
/// Backed by a `DashMap`, so a history is only ever mutated while its shard
/// lock is held. Overlapping requests for the same user are a separate
/// concern, handled by [`ConversationCache::try_acquire`].
pub struct ConversationCache {
    entries: DashMap<UserId, Entry>,
    in_flight: DashSet<UserId>,
    system_prompt: String,
    limits: CacheLimits,
}

impl ConversationCache {
    pub fn new(system_prompt: impl Into<String>, limits: CacheLimits) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashSet::new(),
            system_prompt: system_prompt.into(),
            limits,
        }
    }

    /// Return the user's history, creating a freshly seeded one if needed.
    #[instrument(skip(self), fields(user = %user))]
    pub fn get_or_create(&self, user: &UserId) -> Vec<ConversationTurn> {
        self.prepare_slot(user);
        let mut entry = self
            .entries
            .entry(user.clone())
            .or_insert_with(|| self.seed());
        entry.last_active = Instant::now();
        entry.turns.clone()
    }

    /// Append `turn` to the user's history, seeding the history first if the
    /// user has none.
    #[instrument(skip(self, turn), fields(user = %user, role = %turn.role))]
    pub fn append(&self, user: &UserId, turn: ConversationTurn) {
        self.prepare_slot(user);
        let mut entry = self
            .entries
            .entry(user.clone())
            .or_insert_with(|| self.seed());
        entry.turns.push(turn);
        entry.last_active = Instant::now();
    }

    /// Append only when the user still has a history.
    ///
    /// Returns `false` (and drops the turn) when the history was reset or
    /// evicted in the meantime, so a late reply never lands in a fresh session.
    pub fn append_if_present(&self, user: &UserId, turn: ConversationTurn) -> bool {
        match self.entries.get_mut(user) {
            Some(mut entry) => {
                entry.turns.push(turn);
                entry.last_active = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Read the user's history without creating one.
    pub fn history(&self, user: &UserId) -> Option<Vec<ConversationTurn>> {
        self.entries.get(user).map(|e| e.turns.clone())
    }

    /// Delete the user's history entirely. Returns `true` if one existed.
    #[instrument(skip(self), fields(user = %user))]
    pub fn reset(&self, user: &UserId) -> bool {
        let existed = self.entries.remove(user).is_some();
        debug!(existed, "conversation reset");
        existed
    }

    /// Number of users with a cached history.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark a completion request for `user` as in flight.
    ///
    /// Returns `None` while another request for the same user holds a guard.
    /// The flag clears when the returned guard is dropped.
    pub fn try_acquire(&self, user: &UserId) -> Option<InFlightGuard<'_>> {
        if self.in_flight.insert(user.clone()) {
            Some(InFlightGuard {
                set: &self.in_flight,
                user: user.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_in_flight(&self, user: &UserId) -> bool {
        self.in_flight.contains(user)
    }

    fn seed(&self) -> Entry {
        Entry {
            turns: vec![ConversationTurn::system(self.system_prompt.clone())],
            last_active: Instant::now(),
        }
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.limits
            .idle_ttl
            .is_some_and(|ttl| entry.last_active.elapsed() > ttl)
    }

    /// Drop expired histories and make room for a new entry.
    ///
    /// Only a new user triggers the full sweep; a returning user checks its
    /// own entry alone. No map references may be held by the caller.
    fn prepare_slot(&self, user: &UserId) {
        if self.limits.idle_ttl.is_some()
            && self
                .entries
                .remove_if(user, |_, entry| self.is_expired(entry))
                .is_some()
        {
            debug!(user = %user, "idle conversation expired");
        }

        if self.entries.contains_key(user) {
            return;
        }
        self.sweep_expired();

        if self.limits.max_users == 0 {
            return;
        }

        while self.entries.len() >= self.limits.max_users {
            if !self.evict_one() {
                break;
            }
        }
    }

    /// Remove every idle history whose user has no request in flight.
    fn sweep_expired(&self) {
        if self.limits.idle_ttl.is_none() {
            return;
        }
        let before = self.entries.len();
        self.entries
            .retain(|user, entry| self.in_flight.contains(user) || !self.is_expired(entry));
        let swept = before.saturating_sub(self.entries.len());
        if swept > 0 {
            debug!(swept, "idle conversations expired");
        }
    }

    /// Evict the least recently active user that has no request in flight.
    fn evict_one(&self) -> bool {
        let victim = self
            .entries
            .iter()
            .filter(|e| !self.in_flight.contains(e.key()))
            .min_by_key(|e| e.value().last_active)
            .map(|e| e.key().clone());

        match victim {
            Some(user) => {
                self.entries.remove(&user);
                debug!(user = %user, "evicted least recently active conversation");
                true
            }
            None => false,
        }
    }
}

/// Clears the user's in-flight flag on drop.
pub struct InFlightGuard<'a> {
    set: &'a DashSet<UserId>,
    user: UserId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.user);
    }
}
