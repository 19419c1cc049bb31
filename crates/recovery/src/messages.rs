//! Messages exchanged over a keep's off-chain broadcast channel during
//! liquidation recovery.

use keep_tbtc_primitives::OperatorId;
use serde::{Deserialize, Serialize};

/// A member's readiness marker for the liquidation recovery protocol.
///
/// Besides signalling readiness it carries the member's liquidation
/// address, freshly derived from its extended public key (or `None` when
/// the member has no key configured and contributes no output), and the
/// member's view of the 25-block vbyte fee, which feeds the group's median
/// fee agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationAnnouncement {
    /// The announcing member.
    pub sender: OperatorId,

    /// The member's liquidation payout address, if it configured an
    /// extended public key.
    pub btc_address: Option<String>,

    /// The member's 25-block sat/vbyte fee estimate.
    pub max_fee_per_vbyte: u64,
}
