//! End-to-end tests of liquidation recovery supervision.

use std::{str::FromStr, sync::Arc, time::Duration};

use keep_tbtc_chain::{DepositChain, KeepChain};
use keep_tbtc_monitor::DepositMonitor;
use keep_tbtc_primitives::{Address, DepositId};
use keep_tbtc_recovery::{derive_address, DerivationIndexStorage, LiquidationRecoverer};
use keep_tbtc_test_utils::{
    random_signing_group, LocalChain, LoopbackGroup, LoopbackGroupProvider,
    RecordingBitcoinHandle,
};
use tokio_util::sync::CancellationToken;

const ZPUB: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";

const START_EVENT_DELAY: Duration = Duration::from_millis(100);
const SETTLE_DELAY: Duration = Duration::from_millis(500);

fn deposit_id() -> DepositId {
    DepositId(Address::from_str("0xa5FA806723A7c7c8523F33c39686f20b52612877").unwrap())
}

struct Harness {
    chain: Arc<LocalChain>,
    cancel: CancellationToken,
    group: Arc<LoopbackGroup>,
    btc: Arc<RecordingBitcoinHandle>,
    storage: Arc<DerivationIndexStorage>,
    _storage_dir: tempfile::TempDir,
}

async fn start_liquidation_monitoring() -> Harness {
    let chain = Arc::new(LocalChain::new());
    let cancel = CancellationToken::new();
    let group = Arc::new(LoopbackGroup::new());
    let btc = Arc::new(RecordingBitcoinHandle::new(700));
    let storage_dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(DerivationIndexStorage::new(storage_dir.path()).unwrap());

    let recoverer = Arc::new(LiquidationRecoverer::new(
        chain.operator_address(),
        bitcoin::Network::Bitcoin,
        Some(ZPUB.to_owned()),
        Duration::from_secs(5),
        btc.clone(),
        storage.clone(),
    ));

    let monitors = DepositMonitor::new(chain.clone(), cancel.clone());
    monitors
        .monitor_liquidation(
            recoverer,
            Arc::new(LoopbackGroupProvider::new(group.clone())),
        )
        .await;

    Harness {
        chain,
        cancel,
        group,
        btc,
        storage,
        _storage_dir: storage_dir,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn terminated_keep_pays_out_to_member_address() {
    let harness = start_liquidation_monitoring().await;
    let chain = &harness.chain;

    // A single-member group: this operator alone.
    let keep_id = chain.create_deposit(deposit_id(), vec![chain.operator_address()]);
    chain
        .submit_keep_public_key(keep_id, harness.group.keep_public_key_bytes())
        .await
        .unwrap();

    tokio::time::sleep(START_EVENT_DELAY).await;
    chain.terminate_keep(keep_id).unwrap();
    tokio::time::sleep(SETTLE_DELAY).await;

    let broadcasts = harness.btc.broadcast_transactions();
    assert_eq!(broadcasts.len(), 1);

    let transaction = &broadcasts[0];
    let funding = chain.funding_info(deposit_id()).await.unwrap();
    assert_eq!(transaction.input.len(), 1);
    assert_eq!(transaction.input[0].previous_output, funding.outpoint);

    // The whole UTXO, minus the fee, pays out to the member's first
    // derived liquidation address.
    assert_eq!(transaction.output.len(), 1);
    let expected_script = derive_address(ZPUB, 0)
        .unwrap()
        .parse::<bitcoin::Address<bitcoin::address::NetworkUnchecked>>()
        .unwrap()
        .assume_checked()
        .script_pubkey();
    assert_eq!(transaction.output[0].script_pubkey, expected_script);

    // The issued index was reserved for the next run.
    assert_eq!(harness.storage.get_next_index(ZPUB).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_keep_triggers_no_recovery() {
    let harness = start_liquidation_monitoring().await;
    let chain = &harness.chain;

    let keep_id = chain.create_deposit(deposit_id(), vec![chain.operator_address()]);
    chain
        .submit_keep_public_key(keep_id, harness.group.keep_public_key_bytes())
        .await
        .unwrap();

    tokio::time::sleep(START_EVENT_DELAY).await;
    chain.close_keep(keep_id).unwrap();
    tokio::time::sleep(SETTLE_DELAY).await;

    assert!(harness.btc.broadcast_transactions().is_empty());
    assert_eq!(harness.storage.get_next_index(ZPUB).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn operator_not_in_signing_group_records_no_side_effects() {
    let harness = start_liquidation_monitoring().await;
    let chain = &harness.chain;

    let keep_id = chain.create_deposit(deposit_id(), random_signing_group(3));
    chain
        .submit_keep_public_key(keep_id, harness.group.keep_public_key_bytes())
        .await
        .unwrap();

    tokio::time::sleep(START_EVENT_DELAY).await;
    chain.terminate_keep(keep_id).unwrap();
    tokio::time::sleep(SETTLE_DELAY).await;

    assert!(harness.btc.broadcast_transactions().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_stops_the_watcher() {
    let harness = start_liquidation_monitoring().await;
    let chain = &harness.chain;

    let keep_id = chain.create_deposit(deposit_id(), vec![chain.operator_address()]);
    chain
        .submit_keep_public_key(keep_id, harness.group.keep_public_key_bytes())
        .await
        .unwrap();

    tokio::time::sleep(START_EVENT_DELAY).await;
    harness.cancel.cancel();
    tokio::time::sleep(START_EVENT_DELAY).await;

    chain.terminate_keep(keep_id).unwrap();
    tokio::time::sleep(SETTLE_DELAY).await;

    assert!(harness.btc.broadcast_transactions().is_empty());
}
