//! The admission ledger: active reservations plus an append-only history.
//!
//! # Design
//!
//! - **At most one** active reservation per (node, constraint item).
//! - **Append-only history**: every reserve and release is recorded with a
//!   sequence number and timestamp; entries are never modified or removed.
//! - **Exact pairing**: a release without a matching reservation is a
//!   typed error, which is how double-release bugs surface in tests.
//!
//! The ledger itself is not thread-safe; a cluster advances all of its
//! agents from one execution context and holds the ledger exclusively. If
//! nodes are ever driven from different contexts, wrap the ledger in a
//! single mutex -- the operations here are all short and non-blocking.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use palaver_types::{ItemId, NodeId};

use crate::LedgerError;

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReservationAction {
    /// The node committed to supplying the constraint item.
    Reserved,
    /// The commitment was released.
    Released,
}

/// One append-only record of a reservation life-cycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationEntry {
    /// Monotonic sequence number, unique within this ledger.
    pub seq: u64,
    /// The node whose commitment changed.
    pub node: NodeId,
    /// The constraint item concerned.
    pub item: ItemId,
    /// Whether the commitment was taken or released.
    pub action: ReservationAction,
    /// Wall-clock time the event was recorded.
    pub at: DateTime<Utc>,
}

/// Tracks which constraint items each node is currently committed to.
#[derive(Debug, Default)]
pub struct AdmissionLedger {
    /// Active commitments.
    reserved: BTreeSet<(NodeId, ItemId)>,
    /// Every reserve/release ever recorded, in order.
    history: Vec<ReservationEntry>,
    /// Next history sequence number.
    next_seq: u64,
}

impl AdmissionLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            reserved: BTreeSet::new(),
            history: Vec::new(),
            next_seq: 0,
        }
    }

    /// Whether the node holds no active commitment for the item.
    ///
    /// The null item sentinel is always "missing": free contributions are
    /// never subject to admission control.
    pub fn is_missing(&self, node: NodeId, item: ItemId) -> bool {
        item.is_none() || !self.reserved.contains(&(node, item))
    }

    /// Commit the node to supplying the constraint item.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NullItem`] for the null sentinel and
    /// [`LedgerError::AlreadyReserved`] if the node already holds a
    /// commitment for this item.
    pub fn reserve(&mut self, node: NodeId, item: ItemId) -> Result<(), LedgerError> {
        if item.is_none() {
            return Err(LedgerError::NullItem);
        }
        if !self.reserved.insert((node, item)) {
            return Err(LedgerError::AlreadyReserved { node, item });
        }
        self.record(node, item, ReservationAction::Reserved)?;
        debug!(%node, %item, "constraint reserved");
        Ok(())
    }

    /// Release the node's commitment for the constraint item.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotReserved`] if no matching commitment is
    /// active -- the caller released twice or never reserved.
    pub fn release(&mut self, node: NodeId, item: ItemId) -> Result<(), LedgerError> {
        if !self.reserved.remove(&(node, item)) {
            return Err(LedgerError::NotReserved { node, item });
        }
        self.record(node, item, ReservationAction::Released)?;
        debug!(%node, %item, "constraint released");
        Ok(())
    }

    /// Number of active commitments across all nodes.
    pub fn outstanding(&self) -> usize {
        self.reserved.len()
    }

    /// Whether no commitment is active anywhere.
    ///
    /// After every spawned negotiation has concluded this must hold; a
    /// `false` here means a reservation leaked.
    pub fn is_clear(&self) -> bool {
        self.reserved.is_empty()
    }

    /// The full append-only history, oldest first.
    pub fn history(&self) -> &[ReservationEntry] {
        &self.history
    }

    fn record(
        &mut self,
        node: NodeId,
        item: ItemId,
        action: ReservationAction,
    ) -> Result<(), LedgerError> {
        let seq = self.next_seq;
        self.next_seq = seq.checked_add(1).ok_or(LedgerError::SequenceOverflow)?;
        self.history.push(ReservationEntry {
            seq,
            node,
            item,
            action,
            at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ledger_is_clear() {
        let ledger = AdmissionLedger::new();
        assert!(ledger.is_clear());
        assert_eq!(ledger.outstanding(), 0);
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn reserve_then_release_returns_to_clear() {
        let mut ledger = AdmissionLedger::new();
        assert!(ledger.reserve(NodeId(1), ItemId(4)).is_ok());
        assert!(!ledger.is_missing(NodeId(1), ItemId(4)));
        assert!(ledger.release(NodeId(1), ItemId(4)).is_ok());
        assert!(ledger.is_clear());
        assert_eq!(ledger.history().len(), 2);
    }

    #[test]
    fn double_reserve_is_rejected() {
        let mut ledger = AdmissionLedger::new();
        assert!(ledger.reserve(NodeId(1), ItemId(4)).is_ok());
        assert_eq!(
            ledger.reserve(NodeId(1), ItemId(4)),
            Err(LedgerError::AlreadyReserved {
                node: NodeId(1),
                item: ItemId(4),
            })
        );
    }

    #[test]
    fn same_item_on_different_nodes_is_independent() {
        let mut ledger = AdmissionLedger::new();
        assert!(ledger.reserve(NodeId(1), ItemId(4)).is_ok());
        assert!(ledger.reserve(NodeId(2), ItemId(4)).is_ok());
        assert_eq!(ledger.outstanding(), 2);
    }

    #[test]
    fn release_without_reserve_is_rejected() {
        let mut ledger = AdmissionLedger::new();
        assert_eq!(
            ledger.release(NodeId(3), ItemId(9)),
            Err(LedgerError::NotReserved {
                node: NodeId(3),
                item: ItemId(9),
            })
        );
    }

    #[test]
    fn null_item_is_never_subject_to_admission() {
        let mut ledger = AdmissionLedger::new();
        assert!(ledger.is_missing(NodeId(1), ItemId::NONE));
        assert_eq!(ledger.reserve(NodeId(1), ItemId::NONE), Err(LedgerError::NullItem));
        // Still "missing" even while other reservations are active.
        assert!(ledger.reserve(NodeId(1), ItemId(2)).is_ok());
        assert!(ledger.is_missing(NodeId(1), ItemId::NONE));
    }

    #[test]
    fn history_serializes_for_audit_dumps() {
        let mut ledger = AdmissionLedger::new();
        let _ = ledger.reserve(NodeId(1), ItemId(4));
        let json = serde_json::to_string(ledger.history()).ok();
        assert!(json.is_some_and(|j| j.contains("\"Reserved\"")));
    }

    #[test]
    fn history_records_actions_in_sequence() {
        let mut ledger = AdmissionLedger::new();
        let _ = ledger.reserve(NodeId(1), ItemId(4));
        let _ = ledger.release(NodeId(1), ItemId(4));
        let actions: Vec<_> = ledger.history().iter().map(|e| (e.seq, e.action)).collect();
        assert_eq!(
            actions,
            vec![
                (0, ReservationAction::Reserved),
                (1, ReservationAction::Released),
            ]
        );
    }
}
