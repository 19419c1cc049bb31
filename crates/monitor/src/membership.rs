//! Signing group membership filter.
//!
//! Every monitor gates on membership: an operator that is not part of a
//! keep's signing group must record no side effects for that keep's
//! deposit.

use keep_tbtc_chain::{ChainError, TbtcChain};
use keep_tbtc_primitives::DepositId;

/// Whether this operator's chain address is a member of the signing group
/// backing the given deposit.
pub async fn is_member_of_signing_group<C>(
    chain: &C,
    deposit_id: DepositId,
) -> Result<bool, ChainError>
where
    C: TbtcChain + ?Sized,
{
    let keep_id = chain.keep_for_deposit(deposit_id).await?;
    let members = chain.members(keep_id).await?;
    Ok(members.contains(&chain.operator_address()))
}
