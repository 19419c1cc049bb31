//! Tests of the public key submission workaround against the local chain.

use keep_tbtc_chain::{submit_keep_public_key_with_retry, ChainError, KeepChain};
use keep_tbtc_primitives::{Address, KeepId};
use keep_tbtc_test_utils::{random_signing_group, LocalChain};

fn keep_id() -> KeepId {
    KeepId(Address::from_bytes([0xab; 20]))
}

#[tokio::test]
async fn submits_on_first_attempt() {
    let chain = LocalChain::new();
    chain.open_keep(keep_id(), random_signing_group(3));

    let public_key = [7u8; 64];
    submit_keep_public_key_with_retry(&chain, keep_id(), public_key)
        .await
        .unwrap();

    assert_eq!(chain.submit_keep_public_key_calls(), 1);
    assert_eq!(
        chain.keep_public_key(keep_id()).await.unwrap(),
        public_key.to_vec()
    );
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_ten_attempts() {
    let chain = LocalChain::new();
    chain.open_keep(keep_id(), random_signing_group(3));
    chain.set_always_failing_transactions(&["SubmitKeepPublicKey"]);

    let result = submit_keep_public_key_with_retry(&chain, keep_id(), [7u8; 64]).await;

    assert!(matches!(
        result,
        Err(ChainError::TransactionReverted { .. })
    ));
    assert_eq!(chain.submit_keep_public_key_calls(), 10);
    assert!(chain.keep_public_key(keep_id()).await.unwrap().is_empty());
}
