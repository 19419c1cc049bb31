//! Public key submission with the load-balanced RPC workaround.

use std::time::Duration;

use keep_tbtc_primitives::KeepId;
use tracing::warn;

use crate::{error::ChainError, keep::KeepChain};

/// Number of attempts made before a public key submission is given up on.
const PUBKEY_SUBMISSION_ATTEMPTS: u32 = 10;

/// Delay between public key submission attempts.
const PUBKEY_SUBMISSION_DELAY: Duration = Duration::from_secs(12);

/// Submits the keep public key, retrying up to 10 times spaced 12 s apart.
///
/// A submission can fail because a freshly cloned keep contract has not
/// been indexed by the RPC node answering the call yet. That happens when
/// nodes sit behind a load balancer and are not fully synced with each
/// other, so the submission is repeated until one of the back-ends accepts
/// it. The final error is returned when all attempts fail.
pub async fn submit_keep_public_key_with_retry<C>(
    chain: &C,
    keep_id: KeepId,
    public_key: [u8; 64],
) -> Result<(), ChainError>
where
    C: KeepChain + ?Sized,
{
    let mut attempt = 1;
    loop {
        match chain.submit_keep_public_key(keep_id, public_key).await {
            Ok(()) => return Ok(()),
            Err(error) => {
                if attempt == PUBKEY_SUBMISSION_ATTEMPTS {
                    return Err(error);
                }
                warn!(%keep_id, attempt, %error, "public key submission failed; retrying");
                tokio::time::sleep(PUBKEY_SUBMISSION_DELAY).await;
                attempt += 1;
            }
        }
    }
}
