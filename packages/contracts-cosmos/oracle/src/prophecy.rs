//! Prophecy state machine
//!
//! ```text
//! Open ──quorum──▶ Finalized ──action──▶ Executed
//!   └──window elapsed──▶ Expired
//! ```
//!
//! The first claim for an id fixes the canonical content. Later claims must
//! match it exactly; each validator's weight is counted once. This module
//! only mutates the record; the contract decides what to persist and which
//! messages to emit.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, HexBinary, Uint256};

use crate::msg::ClaimKind;

#[cw_serde]
#[derive(Copy, Eq)]
pub enum ProphecyStatus {
    Open,
    Finalized,
    Executed,
    Expired,
}

/// Fields every validator must agree on
#[cw_serde]
pub struct ClaimContent {
    pub kind: ClaimKind,
    pub sender: Binary,
    pub symbol: String,
    pub amount: Uint256,
    pub destination: Binary,
    pub token: String,
}

/// One validator's recorded claim
#[cw_serde]
pub struct Attestation {
    pub validator: Addr,
    pub content_hash: HexBinary,
    pub signature: Binary,
    pub height: u64,
    /// Weight added to the tally; zero for audit-only and rejected claims
    pub weight: u64,
}

#[cw_serde]
pub struct Prophecy {
    pub id: HexBinary,
    /// Starts at 1; bumped when an expired record is reopened
    pub attempt: u32,
    pub status: ProphecyStatus,
    pub content: ClaimContent,
    pub content_hash: HexBinary,
    /// Validator set the tally is weighed against
    pub validator_set_version: u64,
    pub threshold: u64,
    pub tally: u64,
    pub attestations: Vec<Attestation>,
    pub opened_at: u64,
    pub finalized_at: Option<u64>,
    /// Set on any conflicting or equivocating claim
    pub needs_review: bool,
    pub conflicts: u32,
}

/// Why a claim was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Content differs from the canonical content
    Conflict,
    /// The validator already claimed different content
    Equivocation,
    Expired,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Conflict => "conflicting_claim",
            RejectReason::Equivocation => "equivocation",
            RejectReason::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// First counted claim on the record
    Opened,
    Accepted,
    /// Same validator, same content; nothing changed
    Duplicate,
    /// This claim reached quorum
    Finalized,
    /// Recorded after quorum; never re-triggers the action
    AuditOnly,
    Rejected(RejectReason),
}

impl ClaimOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimOutcome::Opened => "opened",
            ClaimOutcome::Accepted => "accepted",
            ClaimOutcome::Duplicate => "duplicate",
            ClaimOutcome::Finalized => "finalized",
            ClaimOutcome::AuditOnly => "audit_only",
            ClaimOutcome::Rejected(_) => "rejected",
        }
    }
}

/// A validator's claim as presented to [`Prophecy::apply_claim`]
#[derive(Debug, Clone)]
pub struct Vote {
    pub validator: Addr,
    /// Weight in the prophecy's validator set
    pub weight: u64,
    pub content_hash: HexBinary,
    pub signature: Binary,
    pub height: u64,
}

impl Prophecy {
    pub fn open(
        id: HexBinary,
        attempt: u32,
        content: ClaimContent,
        content_hash: HexBinary,
        validator_set_version: u64,
        threshold: u64,
        height: u64,
    ) -> Self {
        Self {
            id,
            attempt,
            status: ProphecyStatus::Open,
            content,
            content_hash,
            validator_set_version,
            threshold,
            tally: 0,
            attestations: vec![],
            opened_at: height,
            finalized_at: None,
            needs_review: false,
            conflicts: 0,
        }
    }

    pub fn validator_claim(&self, validator: &Addr) -> Option<&Attestation> {
        self.attestations.iter().find(|a| &a.validator == validator)
    }

    /// Apply one validator's claim.
    pub fn apply_claim(&mut self, vote: Vote) -> ClaimOutcome {
        if self.status == ProphecyStatus::Expired {
            return ClaimOutcome::Rejected(RejectReason::Expired);
        }

        if let Some(existing) = self.validator_claim(&vote.validator) {
            if existing.content_hash == vote.content_hash {
                return ClaimOutcome::Duplicate;
            }
            self.flag_for_review();
            return ClaimOutcome::Rejected(RejectReason::Equivocation);
        }

        if vote.content_hash != self.content_hash {
            self.flag_for_review();
            self.record(vote, 0);
            return ClaimOutcome::Rejected(RejectReason::Conflict);
        }

        match self.status {
            ProphecyStatus::Open => {
                let first = self.tally == 0;
                let weight = vote.weight;
                let height = vote.height;
                self.record(vote, weight);
                self.tally = self.tally.saturating_add(weight);

                if self.tally >= self.threshold {
                    self.status = ProphecyStatus::Finalized;
                    self.finalized_at = Some(height);
                    ClaimOutcome::Finalized
                } else if first {
                    ClaimOutcome::Opened
                } else {
                    ClaimOutcome::Accepted
                }
            }
            ProphecyStatus::Finalized | ProphecyStatus::Executed => {
                self.record(vote, 0);
                ClaimOutcome::AuditOnly
            }
            ProphecyStatus::Expired => ClaimOutcome::Rejected(RejectReason::Expired),
        }
    }

    /// Move an open prophecy to Expired once its window has elapsed
    pub fn expire_if_due(&mut self, height: u64, expiry_blocks: u64) -> bool {
        if self.status == ProphecyStatus::Open
            && height >= self.opened_at.saturating_add(expiry_blocks)
        {
            self.status = ProphecyStatus::Expired;
            return true;
        }
        false
    }

    /// Record that the destination action ran. Only a Finalized record moves.
    pub fn mark_executed(&mut self) -> bool {
        if self.status == ProphecyStatus::Finalized {
            self.status = ProphecyStatus::Executed;
            return true;
        }
        false
    }

    fn record(&mut self, vote: Vote, weight: u64) {
        self.attestations.push(Attestation {
            validator: vote.validator,
            content_hash: vote.content_hash,
            signature: vote.signature,
            height: vote.height,
            weight,
        });
    }

    fn flag_for_review(&mut self) {
        self.needs_review = true;
        self.conflicts = self.conflicts.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(amount: u64) -> ClaimContent {
        ClaimContent {
            kind: ClaimKind::LockOnEthereum,
            sender: Binary::from(vec![0xaa; 20]),
            symbol: "ETH".to_string(),
            amount: Uint256::from(amount),
            destination: Binary::from(b"cosmos1xyz".to_vec()),
            token: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
        }
    }

    fn hash(tag: u8) -> HexBinary {
        HexBinary::from(vec![tag; 32])
    }

    fn vote(validator: &str, weight: u64, content_hash: HexBinary) -> Vote {
        Vote {
            validator: Addr::unchecked(validator),
            weight,
            content_hash,
            signature: Binary::from(vec![1u8; 65]),
            height: 10,
        }
    }

    fn prophecy() -> Prophecy {
        // Weights 40/40/20, quorum 2/3 of 100
        Prophecy::open(hash(0xee), 1, content(1000), hash(1), 1, 67, 5)
    }

    #[test]
    fn test_two_of_three_reach_quorum() {
        let mut p = prophecy();
        assert_eq!(p.apply_claim(vote("v1", 40, hash(1))), ClaimOutcome::Opened);
        assert_eq!(p.status, ProphecyStatus::Open);
        assert_eq!(p.apply_claim(vote("v2", 40, hash(1))), ClaimOutcome::Finalized);
        assert_eq!(p.tally, 80);
        assert_eq!(p.status, ProphecyStatus::Finalized);
        assert_eq!(p.finalized_at, Some(10));

        assert!(p.mark_executed());
        assert!(!p.mark_executed());
        assert_eq!(p.status, ProphecyStatus::Executed);
    }

    #[test]
    fn test_resubmission_is_not_double_counted() {
        let mut p = prophecy();
        p.apply_claim(vote("v1", 40, hash(1)));
        for _ in 0..5 {
            assert_eq!(p.apply_claim(vote("v1", 40, hash(1))), ClaimOutcome::Duplicate);
        }
        assert_eq!(p.tally, 40);
        assert_eq!(p.attestations.len(), 1);
        assert_eq!(p.status, ProphecyStatus::Open);
    }

    #[test]
    fn test_low_weight_validators_below_quorum() {
        let mut p = prophecy();
        p.apply_claim(vote("v1", 40, hash(1)));
        assert_eq!(p.apply_claim(vote("v3", 20, hash(1))), ClaimOutcome::Accepted);
        assert_eq!(p.tally, 60);
        assert_eq!(p.status, ProphecyStatus::Open);
    }

    #[test]
    fn test_conflicting_content_rejected_and_flagged() {
        let mut p = prophecy();
        p.apply_claim(vote("v1", 40, hash(1)));

        let outcome = p.apply_claim(vote("w", 40, hash(2)));
        assert_eq!(outcome, ClaimOutcome::Rejected(RejectReason::Conflict));
        assert!(p.needs_review);
        assert_eq!(p.conflicts, 1);
        assert_eq!(p.tally, 40);
        assert_eq!(p.content, content(1000));
        assert_eq!(p.content_hash, hash(1));

        // The conflicting claim is kept for audit with no weight
        let recorded = p.validator_claim(&Addr::unchecked("w")).unwrap();
        assert_eq!(recorded.content_hash, hash(2));
        assert_eq!(recorded.weight, 0);
    }

    #[test]
    fn test_equivocation_does_not_overwrite() {
        let mut p = prophecy();
        p.apply_claim(vote("v1", 40, hash(1)));

        let outcome = p.apply_claim(vote("v1", 40, hash(3)));
        assert_eq!(outcome, ClaimOutcome::Rejected(RejectReason::Equivocation));
        assert!(p.needs_review);
        assert_eq!(
            p.validator_claim(&Addr::unchecked("v1")).unwrap().content_hash,
            hash(1)
        );
        assert_eq!(p.tally, 40);
    }

    #[test]
    fn test_claims_after_execution_are_audit_only() {
        let mut p = prophecy();
        p.apply_claim(vote("v1", 40, hash(1)));
        p.apply_claim(vote("v2", 40, hash(1)));
        p.mark_executed();

        assert_eq!(p.apply_claim(vote("v3", 20, hash(1))), ClaimOutcome::AuditOnly);
        assert_eq!(p.tally, 80);
        assert_eq!(p.status, ProphecyStatus::Executed);
        assert_eq!(p.attestations.len(), 3);
    }

    #[test]
    fn test_expiry() {
        let mut p = prophecy();
        p.apply_claim(vote("v1", 40, hash(1)));

        assert!(!p.expire_if_due(14, 10));
        assert!(p.expire_if_due(15, 10));
        assert_eq!(p.status, ProphecyStatus::Expired);
        assert_eq!(
            p.apply_claim(vote("v2", 40, hash(1))),
            ClaimOutcome::Rejected(RejectReason::Expired)
        );
        assert_eq!(p.tally, 40);

        // Finalized records never expire
        let mut done = prophecy();
        done.apply_claim(vote("v1", 40, hash(1)));
        done.apply_claim(vote("v2", 40, hash(1)));
        assert!(!done.expire_if_due(1_000, 10));
    }
}
