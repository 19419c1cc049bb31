//! End-to-end test of the engine wiring.

use std::{str::FromStr, sync::Arc, time::Duration};

use keep_tbtc_chain::{DepositChain, KeepChain};
use keep_tbtc_monitor::{initialize, Config};
use keep_tbtc_primitives::{Address, DepositId};
use keep_tbtc_test_utils::{LocalChain, LoopbackGroup, LoopbackGroupProvider};
use rand::Rng;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread")]
async fn initialized_engine_monitors_deposits() {
    let chain = Arc::new(LocalChain::new());
    let cancel = CancellationToken::new();
    let groups = Arc::new(LoopbackGroupProvider::new(Arc::new(LoopbackGroup::new())));
    let storage_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.monitor.retrieve_pubkey_timeout = Duration::from_millis(500);
    config.liquidation.storage_dir = storage_dir.path().to_path_buf();
    // No Electrs URL and no extended public key: the liquidation path is
    // disabled, the deposit monitors must run regardless.

    initialize(cancel.clone(), chain.clone(), groups, config)
        .await
        .unwrap();

    let deposit_id =
        DepositId(Address::from_str("0xa5FA806723A7c7c8523F33c39686f20b52612877").unwrap());
    chain.create_deposit(deposit_id, vec![chain.operator_address()]);

    let keep_id = chain.keep_for_deposit(deposit_id).await.unwrap();
    let mut public_key = [0u8; 64];
    rand::thread_rng().fill(&mut public_key);
    chain.submit_keep_public_key(keep_id, public_key).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(chain.retrieve_signer_pubkey_calls(), 1);
    assert_eq!(chain.deposit_pubkey(deposit_id), Some(public_key.to_vec()));

    cancel.cancel();
}
