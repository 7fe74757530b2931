//! Per-node admission ledger for the palaver negotiation protocol.
//!
//! The admission ledger is the one piece of state shared across otherwise
//! independent agent trees: it tracks which constraint items a node has
//! already committed to supply, so that a node never holds two
//! simultaneous commitments for the same constraint item.
//!
//! Contributors consult the ledger before accepting a negotiation
//! proposal, reserve the constraint on acceptance, and release it exactly
//! once when the negotiation concludes -- success, failure, or teardown.
//! Leaked reservations are protocol bugs; the ledger keeps an append-only
//! history so they can be audited after the fact.

pub mod ledger;

pub use ledger::{AdmissionLedger, ReservationAction, ReservationEntry};

use palaver_types::{ItemId, NodeId};

/// Errors produced by admission ledger operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Attempted to reserve a constraint the node is already committed to.
    #[error("node {node} already holds a commitment for item {item}")]
    AlreadyReserved {
        /// The node that attempted the reservation.
        node: NodeId,
        /// The constraint item already committed.
        item: ItemId,
    },

    /// Attempted to release a reservation that does not exist.
    ///
    /// Hitting this means a caller released twice or never reserved;
    /// either way a life-cycle invariant was broken upstream.
    #[error("node {node} holds no commitment for item {item}")]
    NotReserved {
        /// The node that attempted the release.
        node: NodeId,
        /// The constraint item that was not committed.
        item: ItemId,
    },

    /// The null item sentinel can never be reserved.
    ///
    /// A free contribution has no constraint, so there is nothing to
    /// commit; reserving the sentinel would make unrelated free
    /// contributors on one node block each other.
    #[error("the null item sentinel cannot be reserved")]
    NullItem,

    /// The history sequence counter would overflow.
    #[error("reservation history sequence overflow")]
    SequenceOverflow,
}
