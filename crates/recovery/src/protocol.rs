//! The cooperative liquidation recovery protocol.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

use bitcoin::{Network, Txid};
use futures::StreamExt;
use keep_tbtc_btcio::BitcoinHandle;
use keep_tbtc_primitives::{FundingInfo, KeepId, OperatorId, Subscription};
use tracing::{debug, info, warn};

use crate::{
    derive::derive_address,
    errors::RecoveryError,
    group::KeepGroup,
    messages::LiquidationAnnouncement,
    storage::DerivationIndexStorage,
    tx::{
        build_signed_transaction, construct_unsigned_transaction, keep_public_key_from_bytes,
        liquidation_digest,
    },
};

/// Drives liquidation recovery for keeps this operator is a member of.
///
/// One instance is shared by all monitors; the derivation-index store
/// serializes concurrent address reservations per extended public key.
pub struct LiquidationRecoverer {
    operator: OperatorId,
    network: Network,
    extended_public_key: Option<String>,
    ready_timeout: Duration,
    btc: Arc<dyn BitcoinHandle>,
    storage: Arc<DerivationIndexStorage>,
}

impl std::fmt::Debug for LiquidationRecoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiquidationRecoverer")
            .field("operator", &self.operator)
            .field("network", &self.network)
            .field("has_extended_public_key", &self.extended_public_key.is_some())
            .field("ready_timeout", &self.ready_timeout)
            .finish_non_exhaustive()
    }
}

impl LiquidationRecoverer {
    /// Creates a recoverer for this operator.
    ///
    /// `extended_public_key` is optional; a member without one contributes
    /// no payout output and its share is redistributed across the members
    /// that do.
    pub fn new(
        operator: OperatorId,
        network: Network,
        extended_public_key: Option<String>,
        ready_timeout: Duration,
        btc: Arc<dyn BitcoinHandle>,
        storage: Arc<DerivationIndexStorage>,
    ) -> Self {
        Self {
            operator,
            network,
            extended_public_key,
            ready_timeout,
            btc,
            storage,
        }
    }

    /// Runs one liquidation recovery attempt for a terminated keep.
    ///
    /// The protocol: announce readiness (with this member's liquidation
    /// address and fee view) on the group channel, collect every member's
    /// announcement within the readiness window, agree on the median fee,
    /// deterministically construct the split transaction, have the group
    /// sign its BIP-143 digest, and broadcast the result. Any failure
    /// aborts the attempt without touching on-chain state.
    pub async fn recover(
        &self,
        keep_id: KeepId,
        members: &[OperatorId],
        keep_public_key: &[u8],
        funding: FundingInfo,
        group: &dyn KeepGroup,
    ) -> Result<Txid, RecoveryError> {
        info!(%keep_id, "starting liquidation recovery");

        let keep_pubkey = keep_public_key_from_bytes(keep_public_key)?;

        let btc_address = match &self.extended_public_key {
            Some(key) => Some(self.reserve_liquidation_address(key).await?),
            None => {
                warn!(
                    %keep_id,
                    "no extended public key configured; contributing no payout output"
                );
                None
            }
        };

        let max_fee_per_vbyte = match self.btc.vbyte_fee_for_25_blocks().await {
            Ok(fee) => fee,
            Err(error) => {
                warn!(%error, "could not retrieve a vbyte fee estimate; announcing 0");
                0
            }
        };

        // Subscribe before announcing so no member's marker is lost.
        let announcements = group.announcements().await?;
        let own = LiquidationAnnouncement {
            sender: self.operator,
            btc_address,
            max_fee_per_vbyte,
        };
        group.publish(own.clone()).await?;

        let collected = tokio::time::timeout(
            self.ready_timeout,
            collect_announcements(members, own, announcements),
        )
        .await
        .map_err(|_| RecoveryError::ReadyWindowExpired)??;

        let recipients: Vec<String> = collected
            .values()
            .filter_map(|announcement| announcement.btc_address.clone())
            .collect();
        let fee = median_fee(collected.values().map(|a| a.max_fee_per_vbyte));
        debug!(
            %keep_id,
            recipients = recipients.len(),
            fee,
            "collected liquidation announcements"
        );

        let unsigned = construct_unsigned_transaction(
            &funding.outpoint.txid.to_string(),
            funding.outpoint.vout,
            funding.value,
            fee,
            &recipients,
            self.network,
        )?;

        let digest = liquidation_digest(&unsigned, &keep_pubkey, funding.value)?;
        let signature = group.sign(digest).await?;
        let signed = build_signed_transaction(&unsigned, &signature, &keep_pubkey)?;

        let txid = self.btc.broadcast_transaction(&signed).await?;
        info!(%keep_id, %txid, "liquidation transaction broadcast");
        Ok(txid)
    }

    /// Picks the next unused liquidation address for the configured
    /// extended public key and reserves its index in the store.
    ///
    /// Address-usage lookups erring count as unused so recovery can
    /// proceed without a working Electrs connection.
    async fn reserve_liquidation_address(&self, key: &str) -> Result<String, RecoveryError> {
        let mut index = self.storage.get_next_index(key).await?;
        loop {
            let address = derive_address(key, index)?;
            let unused = self.btc.is_address_unused(&address).await.unwrap_or(true);
            if unused {
                self.storage.save(key, index, &address).await?;
                debug!(index, %address, "reserved liquidation address");
                return Ok(address);
            }
            debug!(index, %address, "liquidation address already used; skipping");
            index += 1;
        }
    }
}

/// Waits until an announcement from every member has arrived.
async fn collect_announcements(
    members: &[OperatorId],
    own: LiquidationAnnouncement,
    mut announcements: Subscription<LiquidationAnnouncement>,
) -> Result<BTreeMap<OperatorId, LiquidationAnnouncement>, RecoveryError> {
    let expected: BTreeSet<OperatorId> = members.iter().copied().collect();
    let mut collected = BTreeMap::new();
    collected.insert(own.sender, own);

    while !expected.iter().all(|member| collected.contains_key(member)) {
        match announcements.next().await {
            Some(announcement) if expected.contains(&announcement.sender) => {
                // First announcement per member wins; duplicates are
                // re-deliveries.
                collected
                    .entry(announcement.sender)
                    .or_insert(announcement);
            }
            Some(announcement) => {
                debug!(sender = %announcement.sender, "ignoring announcement from non-member");
            }
            None => return Err(RecoveryError::AnnouncementChannelClosed),
        }
    }

    Ok(collected)
}

/// The group's agreed fee: the median of the announced estimates, with the
/// lower middle taken for even-sized groups so ties break toward the
/// smaller value.
fn median_fee(fees: impl Iterator<Item = u64>) -> u64 {
    let mut fees: Vec<u64> = fees.collect();
    if fees.is_empty() {
        return 0;
    }
    fees.sort_unstable();
    fees[(fees.len() - 1) / 2]
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bitcoin::OutPoint;
    use keep_tbtc_btcio::BtcioError;
    use keep_tbtc_primitives::{Address, EcdsaSignature};
    use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
    use std::str::FromStr;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedSender;

    use crate::group::{GroupError, KeepGroup};

    use super::*;

    const ZPUB: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";

    fn operator(byte: u8) -> OperatorId {
        Address::from_bytes([byte; 20])
    }

    fn keep_id() -> KeepId {
        KeepId(operator(0xaa))
    }

    fn funding() -> FundingInfo {
        FundingInfo {
            outpoint: OutPoint {
                txid: bitcoin::Txid::from_str(
                    "0b99dea9655f219991001e9296cfe2103dd918a21ef477a14121d1a0ba9491f1",
                )
                .unwrap(),
                vout: 0,
            },
            value: 100_000_000,
        }
    }

    /// In-process stand-in for the keep's broadcast channel and signing
    /// protocol: announcements loop back to a single subscriber and the
    /// group key is one plain secp keypair.
    struct InProcessGroup {
        sender: UnboundedSender<LiquidationAnnouncement>,
        subscription: Mutex<Option<Subscription<LiquidationAnnouncement>>>,
        secret: SecretKey,
    }

    impl InProcessGroup {
        fn new(secret: SecretKey) -> Self {
            let (sender, subscription) = Subscription::channel();
            Self {
                sender,
                subscription: Mutex::new(Some(subscription)),
                secret,
            }
        }

        fn public_key(&self) -> PublicKey {
            PublicKey::from_secret_key(SECP256K1, &self.secret)
        }

        fn keep_public_key_bytes(&self) -> Vec<u8> {
            self.public_key().serialize_uncompressed()[1..].to_vec()
        }

        fn inject(&self, announcement: LiquidationAnnouncement) {
            self.sender.send(announcement).unwrap();
        }
    }

    #[async_trait]
    impl KeepGroup for InProcessGroup {
        async fn publish(
            &self,
            announcement: LiquidationAnnouncement,
        ) -> Result<(), GroupError> {
            self.sender
                .send(announcement)
                .map_err(|e| GroupError::Transport(e.to_string()))
        }

        async fn announcements(
            &self,
        ) -> Result<Subscription<LiquidationAnnouncement>, GroupError> {
            self.subscription
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| GroupError::Transport("already subscribed".to_owned()))
        }

        async fn sign(&self, digest: [u8; 32]) -> Result<EcdsaSignature, GroupError> {
            let message = Message::from_digest(digest);
            let compact = SECP256K1
                .sign_ecdsa(&message, &self.secret)
                .serialize_compact();
            Ok(EcdsaSignature {
                r: compact[..32].try_into().unwrap(),
                s: compact[32..].try_into().unwrap(),
                recovery_id: 0,
            })
        }
    }

    /// Records broadcasts and serves canned fee/usage responses.
    struct FakeBitcoinHandle {
        fee: u64,
        broadcasts: Mutex<Vec<bitcoin::Transaction>>,
    }

    impl FakeBitcoinHandle {
        fn new(fee: u64) -> Self {
            Self {
                fee,
                broadcasts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BitcoinHandle for FakeBitcoinHandle {
        async fn broadcast_transaction(
            &self,
            transaction: &bitcoin::Transaction,
        ) -> Result<bitcoin::Txid, BtcioError> {
            self.broadcasts.lock().unwrap().push(transaction.clone());
            Ok(transaction.compute_txid())
        }

        async fn vbyte_fee_for_25_blocks(&self) -> Result<u64, BtcioError> {
            Ok(self.fee)
        }

        async fn is_address_unused(&self, _address: &str) -> Result<bool, BtcioError> {
            Ok(true)
        }
    }

    fn recoverer(
        operator_id: OperatorId,
        xpub: Option<&str>,
        btc: Arc<FakeBitcoinHandle>,
        storage: Arc<DerivationIndexStorage>,
        ready_timeout: Duration,
    ) -> LiquidationRecoverer {
        LiquidationRecoverer::new(
            operator_id,
            Network::Bitcoin,
            xpub.map(str::to_owned),
            ready_timeout,
            btc,
            storage,
        )
    }

    #[tokio::test]
    async fn single_member_recovery_broadcasts_signed_split() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(DerivationIndexStorage::new(dir.path()).unwrap());
        let btc = Arc::new(FakeBitcoinHandle::new(700));
        let group = InProcessGroup::new(SecretKey::from_slice(&[5u8; 32]).unwrap());

        let recoverer = recoverer(
            operator(1),
            Some(ZPUB),
            btc.clone(),
            storage.clone(),
            Duration::from_secs(5),
        );

        let txid = recoverer
            .recover(
                keep_id(),
                &[operator(1)],
                &group.keep_public_key_bytes(),
                funding(),
                &group,
            )
            .await
            .unwrap();

        let broadcasts = btc.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        let transaction = &broadcasts[0];
        assert_eq!(transaction.compute_txid(), txid);

        // One recipient: the member's own derived address at index 0.
        assert_eq!(transaction.output.len(), 1);
        let expected_script = derive_address(ZPUB, 0)
            .unwrap()
            .parse::<bitcoin::Address<bitcoin::address::NetworkUnchecked>>()
            .unwrap()
            .assume_checked()
            .script_pubkey();
        assert_eq!(transaction.output[0].script_pubkey, expected_script);

        // The signature in the witness verifies against the group key. The
        // BIP-143 digest is witness-independent, so it can be recomputed
        // from the broadcast transaction directly.
        let digest =
            liquidation_digest(transaction, &group.public_key(), funding().value).unwrap();
        let witness_signature = transaction.input[0].witness.nth(0).unwrap();
        let der = &witness_signature[..witness_signature.len() - 1];
        let parsed = secp256k1::ecdsa::Signature::from_der(der).unwrap();
        assert!(SECP256K1
            .verify_ecdsa(&Message::from_digest(digest), &parsed, &group.public_key())
            .is_ok());

        // The index was reserved.
        assert_eq!(storage.get_next_index(ZPUB).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn keyless_member_contributes_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(DerivationIndexStorage::new(dir.path()).unwrap());
        let btc = Arc::new(FakeBitcoinHandle::new(700));
        let group = InProcessGroup::new(SecretKey::from_slice(&[5u8; 32]).unwrap());

        // The other member announces an address before the protocol runs;
        // the channel is buffered so nothing is lost.
        let other = operator(9);
        let other_address = derive_address(ZPUB, 0).unwrap();
        group.inject(LiquidationAnnouncement {
            sender: other,
            btc_address: Some(other_address.clone()),
            max_fee_per_vbyte: 900,
        });

        let recoverer = recoverer(
            operator(1),
            None,
            btc.clone(),
            storage.clone(),
            Duration::from_secs(5),
        );

        recoverer
            .recover(
                keep_id(),
                &[operator(1), other],
                &group.keep_public_key_bytes(),
                funding(),
                &group,
            )
            .await
            .unwrap();

        let broadcasts = btc.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        // Only the keyed member is paid; the whole distributable value
        // goes to its single output.
        assert_eq!(broadcasts[0].output.len(), 1);
        // Median of {700, 900} is the smaller value.
        let fee = 700 * broadcasts[0].vsize() as u64;
        assert_eq!(
            broadcasts[0].output[0].value,
            bitcoin::Amount::from_sat(funding().value - fee)
        );
        // Nothing was reserved for the keyless member.
        assert_eq!(storage.get_next_index(ZPUB).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expires_when_members_stay_silent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(DerivationIndexStorage::new(dir.path()).unwrap());
        let btc = Arc::new(FakeBitcoinHandle::new(700));
        let group = InProcessGroup::new(SecretKey::from_slice(&[5u8; 32]).unwrap());

        let recoverer = recoverer(
            operator(1),
            Some(ZPUB),
            btc.clone(),
            storage,
            Duration::from_millis(50),
        );

        let result = recoverer
            .recover(
                keep_id(),
                &[operator(1), operator(2)],
                &group.keep_public_key_bytes(),
                funding(),
                &group,
            )
            .await;

        assert!(matches!(result, Err(RecoveryError::ReadyWindowExpired)));
        assert!(btc.broadcasts.lock().unwrap().is_empty());
    }

    #[test]
    fn median_takes_the_lower_middle() {
        assert_eq!(median_fee([5].into_iter()), 5);
        assert_eq!(median_fee([7, 3].into_iter()), 3);
        assert_eq!(median_fee([9, 1, 4].into_iter()), 4);
        assert_eq!(median_fee([8, 2, 6, 4].into_iter()), 4);
        assert_eq!(median_fee(std::iter::empty()), 0);
    }
}
