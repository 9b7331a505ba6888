//! # Rotation Table
//!
//! Synchronous bookkeeping for the pool: which keys are in use, the
//! round-robin order per authorization group, and the per-group wait lists.
//!
//! ## Rules
//!
//! - Index 0 is the primary key. It belongs to no rotation but may serve any group.
//! - `try_take` scans the group's rotation once, moving each inspected key to the back.
//! - A released key is handed to the oldest waiter among the groups it may serve;
//!   for the primary that is every group.
//! - Invariant: a key is free only if no group it can serve has a waiter.

use std::collections::{HashMap, VecDeque};

use shared_types::AuthGroup;

/// Position of a key in the pool.
pub type KeyIndex = usize;

/// Index of the primary key.
pub const PRIMARY_INDEX: KeyIndex = 0;

/// Use flags, rotations and wait lists.
pub struct RotationTable<W> {
    used: Vec<bool>,
    tags: Vec<Vec<AuthGroup>>,
    rotations: HashMap<AuthGroup, VecDeque<KeyIndex>>,
    waiters: HashMap<AuthGroup, VecDeque<(u64, W)>>,
    next_ticket: u64,
}

impl<W> RotationTable<W> {
    /// Build a table from per-key group tags; `tags[0]` belongs to the primary
    /// and is ignored for rotation purposes.
    pub fn new(tags: Vec<Vec<AuthGroup>>) -> Self {
        let key_count = tags.len().max(1);
        let mut rotations: HashMap<AuthGroup, VecDeque<KeyIndex>> = HashMap::new();
        for (index, groups) in tags.iter().enumerate().skip(1) {
            for group in groups {
                let rotation = rotations.entry(*group).or_default();
                if !rotation.contains(&index) {
                    rotation.push_back(index);
                }
            }
        }

        let mut tags = tags;
        tags.resize(key_count, Vec::new());

        Self {
            used: vec![false; key_count],
            tags,
            rotations,
            waiters: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Claim a free key for `group`: next free secondary in rotation order,
    /// else the primary, else nothing.
    pub fn try_take(&mut self, group: AuthGroup) -> Option<KeyIndex> {
        if let Some(rotation) = self.rotations.get_mut(&group) {
            for _ in 0..rotation.len() {
                let Some(index) = rotation.pop_front() else {
                    break;
                };
                rotation.push_back(index);
                if !self.used[index] {
                    self.used[index] = true;
                    return Some(index);
                }
            }
        }

        if !self.used[PRIMARY_INDEX] {
            self.used[PRIMARY_INDEX] = true;
            return Some(PRIMARY_INDEX);
        }

        None
    }

    /// Append a waiter to the group's FIFO list.
    pub fn enqueue(&mut self, group: AuthGroup, waiter: W) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.entry(group).or_default().push_back((ticket, waiter));
    }

    /// Pop the oldest waiter that the key at `index` can serve.
    ///
    /// The key stays marked as used; the caller either hands it to the
    /// returned waiter or calls [`mark_free`](Self::mark_free).
    pub fn next_waiter_for(&mut self, index: KeyIndex) -> Option<W> {
        let oldest = if index == PRIMARY_INDEX {
            self.waiters
                .iter()
                .filter_map(|(group, queue)| queue.front().map(|(ticket, _)| (*ticket, *group)))
                .min()
        } else {
            self.tags
                .get(index)?
                .iter()
                .filter_map(|group| {
                    self.waiters
                        .get(group)
                        .and_then(|queue| queue.front())
                        .map(|(ticket, _)| (*ticket, *group))
                })
                .min()
        };

        let (_, group) = oldest?;
        let queue = self.waiters.get_mut(&group)?;
        let waiter = queue.pop_front().map(|(_, waiter)| waiter);
        if queue.is_empty() {
            self.waiters.remove(&group);
        }
        waiter
    }

    /// Return a key to the free set.
    pub fn mark_free(&mut self, index: KeyIndex) {
        if let Some(flag) = self.used.get_mut(index) {
            *flag = false;
        }
    }

    /// Whether the key is currently leased.
    pub fn is_used(&self, index: KeyIndex) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    /// Number of keys not leased.
    pub fn free_count(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    /// Number of callers waiting on `group`.
    pub fn waiting(&self, group: AuthGroup) -> usize {
        self.waiters.get(&group).map_or(0, VecDeque::len)
    }

    /// Total keys including the primary.
    pub fn key_count(&self) -> usize {
        self.used.len()
    }
}
