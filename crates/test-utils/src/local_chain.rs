//! An in-process implementation of the chain façade.

use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
    sync::Mutex,
};

use async_trait::async_trait;
use bitcoin::{hashes::Hash, OutPoint, Txid};
use keep_tbtc_chain::{ChainError, DepositChain, KeepChain};
use keep_tbtc_primitives::{
    events::{
        BondedKeepCreatedEvent, ConflictingPublicKeySubmittedEvent,
        DepositRedemptionRequestedEvent, KeepClosedEvent, KeepTerminatedEvent,
        PublicKeyPublishedEvent, SignatureRequestedEvent, SignatureSubmittedEvent,
    },
    Address, DepositId, DepositState, EcdsaSignature, FundingInfo, KeepId, KeepStatus,
    OperatorId, RedemptionProof, Subscription,
};
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;

/// UTXO value every local deposit is funded with, in satoshi.
const DEPOSIT_UTXO_VALUE: u64 = 1000;

/// Fee of the initial redemption request, in satoshi. Fee bumps grow the
/// fee by this amount.
const INITIAL_REDEMPTION_FEE: u64 = 10;

/// The redemption signature a local deposit holds on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnChainSignature {
    /// Ethereum-style `v`, `27 + recovery_id`.
    pub v: u8,
    /// Signature `r` component.
    pub r: [u8; 32],
    /// Signature `s` component.
    pub s: [u8; 32],
}

/// Generates a random signing group of the given size.
pub fn random_signing_group(size: usize) -> Vec<OperatorId> {
    (0..size).map(|_| random_address()).collect()
}

fn random_address() -> Address {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill(&mut bytes);
    Address::from_bytes(bytes)
}

fn random_digest() -> [u8; 32] {
    let mut digest = [0u8; 32];
    rand::thread_rng().fill(&mut digest);
    digest
}

#[derive(Debug, Default)]
struct LocalKeep {
    members: Vec<OperatorId>,
    honest_threshold: u64,
    status: Option<KeepStatus>,
    public_key: Option<[u8; 64]>,
    latest_digest: [u8; 32],
    digest_blocks: HashMap<[u8; 32], u64>,
    signature_submitted_events: Vec<SignatureSubmittedEvent>,
    opened_at: u64,

    closed_subs: Vec<UnboundedSender<KeepClosedEvent>>,
    terminated_subs: Vec<UnboundedSender<KeepTerminatedEvent>>,
    signature_requested_subs: Vec<UnboundedSender<SignatureRequestedEvent>>,
    public_key_published_subs: Vec<UnboundedSender<PublicKeyPublishedEvent>>,
    conflicting_public_key_subs: Vec<UnboundedSender<ConflictingPublicKeySubmittedEvent>>,
}

impl LocalKeep {
    fn status(&self) -> KeepStatus {
        self.status.unwrap_or(KeepStatus::Active)
    }
}

#[derive(Debug)]
struct LocalDeposit {
    keep_id: KeepId,
    state: DepositState,
    pubkey: Option<Vec<u8>>,
    redemption_digest: Option<[u8; 32]>,
    redemption_signature: Option<OnChainSignature>,
    redemption_proof: Option<RedemptionProof>,
    redemption_fee: u64,
    funding: FundingInfo,
    redemption_requested_events: Vec<DepositRedemptionRequestedEvent>,
}

#[derive(Debug, Default)]
struct LocalState {
    block: u64,
    keeps: HashMap<KeepId, LocalKeep>,
    deposits: HashMap<DepositId, LocalDeposit>,
    always_failing: HashSet<String>,

    keep_created_subs: Vec<UnboundedSender<BondedKeepCreatedEvent>>,
    deposit_created_subs: Vec<UnboundedSender<DepositId>>,
    deposit_registered_pubkey_subs: Vec<UnboundedSender<DepositId>>,
    deposit_redemption_requested_subs: Vec<UnboundedSender<DepositId>>,
    deposit_got_redemption_signature_subs: Vec<UnboundedSender<DepositId>>,
    deposit_redeemed_subs: Vec<UnboundedSender<DepositId>>,

    submit_keep_public_key_calls: usize,
    retrieve_signer_pubkey_calls: usize,
    provide_redemption_signature_calls: usize,
    increase_redemption_fee_calls: usize,
}

impl LocalState {
    fn next_block(&mut self) -> u64 {
        self.block += 1;
        self.block
    }

    fn keep(&self, keep_id: KeepId) -> Result<&LocalKeep, ChainError> {
        self.keeps
            .get(&keep_id)
            .ok_or(ChainError::UnknownKeep(keep_id))
    }

    fn keep_mut(&mut self, keep_id: KeepId) -> Result<&mut LocalKeep, ChainError> {
        self.keeps
            .get_mut(&keep_id)
            .ok_or(ChainError::UnknownKeep(keep_id))
    }

    fn deposit(&self, deposit_id: DepositId) -> Result<&LocalDeposit, ChainError> {
        self.deposits
            .get(&deposit_id)
            .ok_or(ChainError::UnknownDeposit(deposit_id))
    }

    fn deposit_mut(&mut self, deposit_id: DepositId) -> Result<&mut LocalDeposit, ChainError> {
        self.deposits
            .get_mut(&deposit_id)
            .ok_or(ChainError::UnknownDeposit(deposit_id))
    }

    fn fail_if_configured(&self, method: &'static str) -> Result<(), ChainError> {
        if self.always_failing.contains(method) {
            return Err(ChainError::TransactionReverted {
                method,
                reason: "transaction configured to always fail".to_owned(),
            });
        }
        Ok(())
    }

    /// Records a signature request against the keep.
    fn request_signature(&mut self, keep_id: KeepId, digest: [u8; 32]) -> Result<(), ChainError> {
        let block = self.next_block();
        let keep = self.keep_mut(keep_id)?;
        keep.latest_digest = digest;
        keep.digest_blocks.insert(digest, block);
        broadcast(
            &mut keep.signature_requested_subs,
            SignatureRequestedEvent {
                digest,
                block_number: block,
            },
        );
        Ok(())
    }
}

fn broadcast<T: Clone>(subs: &mut Vec<UnboundedSender<T>>, event: T) {
    subs.retain(|sub| sub.send(event.clone()).is_ok());
}

fn subscribe<T>(subs: &mut Vec<UnboundedSender<T>>) -> Subscription<T> {
    let (sender, subscription) = Subscription::channel();
    subs.push(sender);
    subscription
}

/// An in-process chain double with direct handler invocation.
///
/// A single mutex guards the whole chain state; event delivery happens
/// through the subscription channels, so handlers observe events
/// asynchronously exactly as with a real backend.
#[derive(Debug)]
pub struct LocalChain {
    operator: OperatorId,
    state: Mutex<LocalState>,
}

impl Default for LocalChain {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalChain {
    /// Creates a fresh local chain.
    pub fn new() -> Self {
        Self {
            operator: Address::from_str("6299496199d99941193Fdd2d717ef585F431eA05")
                .expect("static operator address must parse"),
            state: Mutex::new(LocalState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LocalState> {
        self.state.lock().expect("local chain state poisoned")
    }

    /// Configures the named submitter methods to always revert. Method
    /// names follow the contract calls, e.g. `"ProvideRedemptionSignature"`
    /// or `"IncreaseRedemptionFee"`.
    pub fn set_always_failing_transactions(&self, methods: &[&str]) {
        let mut state = self.state();
        for method in methods {
            state.always_failing.insert((*method).to_owned());
        }
    }

    /// Opens a keep with the given members.
    pub fn open_keep(&self, keep_id: KeepId, members: Vec<OperatorId>) {
        let mut state = self.state();
        let block = state.next_block();
        let honest_threshold = members.len() as u64;
        state.keeps.insert(
            keep_id,
            LocalKeep {
                members: members.clone(),
                honest_threshold,
                opened_at: block,
                ..LocalKeep::default()
            },
        );
        broadcast(
            &mut state.keep_created_subs,
            BondedKeepCreatedEvent {
                keep_id,
                members,
                honest_threshold,
                block_number: block,
            },
        );
    }

    /// Closes an active keep.
    pub fn close_keep(&self, keep_id: KeepId) -> Result<(), ChainError> {
        let mut state = self.state();
        let block = state.next_block();
        let keep = state.keep_mut(keep_id)?;
        if keep.status() != KeepStatus::Active {
            return Err(ChainError::TransactionReverted {
                method: "CloseKeep",
                reason: "keep is not active".to_owned(),
            });
        }
        keep.status = Some(KeepStatus::Closed);
        broadcast(
            &mut keep.closed_subs,
            KeepClosedEvent {
                block_number: block,
            },
        );
        Ok(())
    }

    /// Terminates an active keep.
    pub fn terminate_keep(&self, keep_id: KeepId) -> Result<(), ChainError> {
        let mut state = self.state();
        let block = state.next_block();
        let keep = state.keep_mut(keep_id)?;
        if keep.status() != KeepStatus::Active {
            return Err(ChainError::TransactionReverted {
                method: "TerminateKeep",
                reason: "keep is not active".to_owned(),
            });
        }
        keep.status = Some(KeepStatus::Terminated);
        broadcast(
            &mut keep.terminated_subs,
            KeepTerminatedEvent {
                block_number: block,
            },
        );
        Ok(())
    }

    /// Creates a deposit backed by a fresh keep with the given signers.
    pub fn create_deposit(&self, deposit_id: DepositId, signers: Vec<OperatorId>) -> KeepId {
        let keep_id = KeepId(random_address());
        self.open_keep(keep_id, signers);

        let mut state = self.state();
        let funding = FundingInfo {
            outpoint: OutPoint {
                txid: Txid::from_byte_array(random_digest()),
                vout: 0,
            },
            value: DEPOSIT_UTXO_VALUE,
        };
        state.deposits.insert(
            deposit_id,
            LocalDeposit {
                keep_id,
                state: DepositState::AwaitingPubkey,
                pubkey: None,
                redemption_digest: None,
                redemption_signature: None,
                redemption_proof: None,
                redemption_fee: 0,
                funding,
                redemption_requested_events: Vec::new(),
            },
        );
        broadcast(&mut state.deposit_created_subs, deposit_id);
        keep_id
    }

    /// Requests redemption of a deposit, asking its keep for a signature.
    pub fn redeem_deposit(&self, deposit_id: DepositId) -> Result<(), ChainError> {
        let digest = random_digest();
        let mut state = self.state();

        let deposit = state.deposit(deposit_id)?;
        if deposit.redemption_digest.is_some() {
            return Err(ChainError::TransactionReverted {
                method: "RequestRedemption",
                reason: format!("redemption of deposit [{deposit_id}] already requested"),
            });
        }
        let keep_id = deposit.keep_id;

        state.request_signature(keep_id, digest)?;
        let block = state.block;

        let deposit = state.deposit_mut(deposit_id)?;
        deposit.redemption_digest = Some(digest);
        deposit.redemption_fee = INITIAL_REDEMPTION_FEE;
        deposit.state = DepositState::AwaitingRedemptionSignature;
        deposit.redemption_requested_events.push(
            DepositRedemptionRequestedEvent {
                deposit_id,
                digest,
                utxo_value: DEPOSIT_UTXO_VALUE,
                redeemer_output_script: Vec::new(),
                requested_fee: INITIAL_REDEMPTION_FEE,
                outpoint: Vec::new(),
                block_number: block,
            },
        );
        broadcast(&mut state.deposit_redemption_requested_subs, deposit_id);
        Ok(())
    }

    /// The deposit's registered signer public key, if any.
    pub fn deposit_pubkey(&self, deposit_id: DepositId) -> Option<Vec<u8>> {
        self.state()
            .deposits
            .get(&deposit_id)
            .and_then(|deposit| deposit.pubkey.clone())
    }

    /// The deposit's provided redemption signature, if any.
    pub fn deposit_redemption_signature(&self, deposit_id: DepositId) -> Option<OnChainSignature> {
        self.state()
            .deposits
            .get(&deposit_id)
            .and_then(|deposit| deposit.redemption_signature)
    }

    /// The deposit's provided redemption proof, if any.
    pub fn deposit_redemption_proof(&self, deposit_id: DepositId) -> Option<RedemptionProof> {
        self.state()
            .deposits
            .get(&deposit_id)
            .and_then(|deposit| deposit.redemption_proof.clone())
    }

    /// The deposit's current redemption fee, if a redemption was requested.
    pub fn deposit_redemption_fee(&self, deposit_id: DepositId) -> Option<u64> {
        self.state()
            .deposits
            .get(&deposit_id)
            .filter(|deposit| deposit.redemption_digest.is_some())
            .map(|deposit| deposit.redemption_fee)
    }

    /// Number of `SubmitKeepPublicKey` submissions observed.
    pub fn submit_keep_public_key_calls(&self) -> usize {
        self.state().submit_keep_public_key_calls
    }

    /// Number of `RetrieveSignerPubkey` submissions observed.
    pub fn retrieve_signer_pubkey_calls(&self) -> usize {
        self.state().retrieve_signer_pubkey_calls
    }

    /// Number of `ProvideRedemptionSignature` submissions observed.
    pub fn provide_redemption_signature_calls(&self) -> usize {
        self.state().provide_redemption_signature_calls
    }

    /// Number of `IncreaseRedemptionFee` submissions observed.
    pub fn increase_redemption_fee_calls(&self) -> usize {
        self.state().increase_redemption_fee_calls
    }
}

#[async_trait]
impl KeepChain for LocalChain {
    fn operator_address(&self) -> OperatorId {
        self.operator
    }

    async fn on_bonded_keep_created(&self) -> Subscription<BondedKeepCreatedEvent> {
        subscribe(&mut self.state().keep_created_subs)
    }

    async fn on_keep_closed(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<KeepClosedEvent>, ChainError> {
        let mut state = self.state();
        let keep = state.keep_mut(keep_id)?;
        Ok(subscribe(&mut keep.closed_subs))
    }

    async fn on_keep_terminated(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<KeepTerminatedEvent>, ChainError> {
        let mut state = self.state();
        let keep = state.keep_mut(keep_id)?;
        Ok(subscribe(&mut keep.terminated_subs))
    }

    async fn on_signature_requested(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<SignatureRequestedEvent>, ChainError> {
        let mut state = self.state();
        let keep = state.keep_mut(keep_id)?;
        Ok(subscribe(&mut keep.signature_requested_subs))
    }

    async fn on_public_key_published(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<PublicKeyPublishedEvent>, ChainError> {
        let mut state = self.state();
        let keep = state.keep_mut(keep_id)?;
        Ok(subscribe(&mut keep.public_key_published_subs))
    }

    async fn on_conflicting_public_key_submitted(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<ConflictingPublicKeySubmittedEvent>, ChainError> {
        let mut state = self.state();
        let keep = state.keep_mut(keep_id)?;
        Ok(subscribe(&mut keep.conflicting_public_key_subs))
    }

    async fn submit_keep_public_key(
        &self,
        keep_id: KeepId,
        public_key: [u8; 64],
    ) -> Result<(), ChainError> {
        let mut state = self.state();
        state.submit_keep_public_key_calls += 1;
        state.fail_if_configured("SubmitKeepPublicKey")?;
        let block = state.next_block();
        let operator = self.operator;
        let keep = state.keep_mut(keep_id)?;

        match keep.public_key {
            None => {
                keep.public_key = Some(public_key);
                broadcast(
                    &mut keep.public_key_published_subs,
                    PublicKeyPublishedEvent {
                        public_key: public_key.to_vec(),
                        block_number: block,
                    },
                );
                Ok(())
            }
            Some(existing) if existing == public_key => {
                Err(ChainError::TransactionReverted {
                    method: "SubmitKeepPublicKey",
                    reason: format!("public key already submitted for keep [{keep_id}]"),
                })
            }
            Some(_) => {
                broadcast(
                    &mut keep.conflicting_public_key_subs,
                    ConflictingPublicKeySubmittedEvent {
                        submitting_member: operator,
                        conflicting_public_key: public_key.to_vec(),
                        block_number: block,
                    },
                );
                Err(ChainError::TransactionReverted {
                    method: "SubmitKeepPublicKey",
                    reason: format!("conflicting public key submitted for keep [{keep_id}]"),
                })
            }
        }
    }

    async fn submit_signature(
        &self,
        keep_id: KeepId,
        signature: &EcdsaSignature,
    ) -> Result<(), ChainError> {
        let mut state = self.state();
        let block = state.next_block();
        let keep = state.keep_mut(keep_id)?;
        if keep.public_key.is_none() {
            return Err(ChainError::TransactionReverted {
                method: "SubmitSignature",
                reason: format!("keep [{keep_id}] has no public key"),
            });
        }
        keep.signature_submitted_events.push(SignatureSubmittedEvent {
            digest: keep.latest_digest,
            r: signature.r,
            s: signature.s,
            recovery_id: signature.recovery_id,
            block_number: block,
        });
        Ok(())
    }

    async fn is_active(&self, keep_id: KeepId) -> Result<bool, ChainError> {
        let state = self.state();
        Ok(state.keep(keep_id)?.status() == KeepStatus::Active)
    }

    async fn keep_public_key(&self, keep_id: KeepId) -> Result<Vec<u8>, ChainError> {
        let state = self.state();
        Ok(state
            .keep(keep_id)?
            .public_key
            .map(|key| key.to_vec())
            .unwrap_or_default())
    }

    async fn members(&self, keep_id: KeepId) -> Result<Vec<OperatorId>, ChainError> {
        let state = self.state();
        Ok(state.keep(keep_id)?.members.clone())
    }

    async fn honest_threshold(&self, keep_id: KeepId) -> Result<u64, ChainError> {
        let state = self.state();
        Ok(state.keep(keep_id)?.honest_threshold)
    }

    async fn opened_timestamp(&self, keep_id: KeepId) -> Result<u64, ChainError> {
        let state = self.state();
        Ok(state.keep(keep_id)?.opened_at)
    }

    async fn latest_digest(&self, keep_id: KeepId) -> Result<[u8; 32], ChainError> {
        let state = self.state();
        Ok(state.keep(keep_id)?.latest_digest)
    }

    async fn signature_requested_block(
        &self,
        keep_id: KeepId,
        digest: [u8; 32],
    ) -> Result<u64, ChainError> {
        let state = self.state();
        Ok(state
            .keep(keep_id)?
            .digest_blocks
            .get(&digest)
            .copied()
            .unwrap_or(0))
    }

    async fn past_signature_submitted_events(
        &self,
        keep_id: KeepId,
        start_block: u64,
    ) -> Result<Vec<SignatureSubmittedEvent>, ChainError> {
        let state = self.state();
        Ok(state
            .keep(keep_id)?
            .signature_submitted_events
            .iter()
            .filter(|event| event.block_number >= start_block)
            .copied()
            .collect())
    }
}

#[async_trait]
impl DepositChain for LocalChain {
    async fn on_deposit_created(&self) -> Subscription<DepositId> {
        subscribe(&mut self.state().deposit_created_subs)
    }

    async fn on_deposit_registered_pubkey(&self) -> Subscription<DepositId> {
        subscribe(&mut self.state().deposit_registered_pubkey_subs)
    }

    async fn on_deposit_redemption_requested(&self) -> Subscription<DepositId> {
        subscribe(&mut self.state().deposit_redemption_requested_subs)
    }

    async fn on_deposit_got_redemption_signature(&self) -> Subscription<DepositId> {
        subscribe(&mut self.state().deposit_got_redemption_signature_subs)
    }

    async fn on_deposit_redeemed(&self) -> Subscription<DepositId> {
        subscribe(&mut self.state().deposit_redeemed_subs)
    }

    async fn keep_for_deposit(&self, deposit_id: DepositId) -> Result<KeepId, ChainError> {
        let state = self.state();
        Ok(state.deposit(deposit_id)?.keep_id)
    }

    async fn deposit_state(&self, deposit_id: DepositId) -> Result<DepositState, ChainError> {
        let state = self.state();
        Ok(state.deposit(deposit_id)?.state)
    }

    async fn funding_info(&self, deposit_id: DepositId) -> Result<FundingInfo, ChainError> {
        let state = self.state();
        Ok(state.deposit(deposit_id)?.funding)
    }

    async fn past_deposit_redemption_requested_events(
        &self,
        deposit_id: DepositId,
        start_block: u64,
    ) -> Result<Vec<DepositRedemptionRequestedEvent>, ChainError> {
        let state = self.state();
        Ok(state
            .deposit(deposit_id)?
            .redemption_requested_events
            .iter()
            .filter(|event| event.block_number >= start_block)
            .cloned()
            .collect())
    }

    async fn retrieve_signer_pubkey(&self, deposit_id: DepositId) -> Result<(), ChainError> {
        let mut state = self.state();
        state.retrieve_signer_pubkey_calls += 1;
        state.fail_if_configured("RetrieveSignerPubkey")?;

        let deposit = state.deposit(deposit_id)?;
        if deposit.pubkey.is_some() {
            return Err(ChainError::TransactionReverted {
                method: "RetrieveSignerPubkey",
                reason: format!("pubkey for deposit [{deposit_id}] already retrieved"),
            });
        }
        let keep_id = deposit.keep_id;

        let Some(public_key) = state.keep(keep_id)?.public_key else {
            return Err(ChainError::TransactionReverted {
                method: "RetrieveSignerPubkey",
                reason: format!("keep of deposit [{deposit_id}] doesn't have a public key yet"),
            });
        };

        let deposit = state.deposit_mut(deposit_id)?;
        deposit.pubkey = Some(public_key.to_vec());
        deposit.state = DepositState::AwaitingRedemptionRequest;
        broadcast(&mut state.deposit_registered_pubkey_subs, deposit_id);
        Ok(())
    }

    async fn provide_redemption_signature(
        &self,
        deposit_id: DepositId,
        v: u8,
        r: [u8; 32],
        s: [u8; 32],
    ) -> Result<(), ChainError> {
        let mut state = self.state();
        state.provide_redemption_signature_calls += 1;
        state.fail_if_configured("ProvideRedemptionSignature")?;

        let deposit = state.deposit_mut(deposit_id)?;
        if deposit.redemption_signature.is_some() {
            return Err(ChainError::TransactionReverted {
                method: "ProvideRedemptionSignature",
                reason: format!(
                    "redemption signature for deposit [{deposit_id}] already provided"
                ),
            });
        }
        deposit.redemption_signature = Some(OnChainSignature { v, r, s });
        deposit.state = DepositState::AwaitingRedemptionProof;
        broadcast(
            &mut state.deposit_got_redemption_signature_subs,
            deposit_id,
        );
        Ok(())
    }

    async fn increase_redemption_fee(
        &self,
        deposit_id: DepositId,
        previous_output_value: [u8; 8],
        new_output_value: [u8; 8],
    ) -> Result<(), ChainError> {
        let digest = random_digest();
        let mut state = self.state();
        state.increase_redemption_fee_calls += 1;
        state.fail_if_configured("IncreaseRedemptionFee")?;

        let deposit = state.deposit(deposit_id)?;
        let initial_fee = deposit
            .redemption_requested_events
            .first()
            .map(|event| event.requested_fee)
            .ok_or(ChainError::TransactionReverted {
                method: "IncreaseRedemptionFee",
                reason: format!("no redemption requested for deposit [{deposit_id}]"),
            })?;

        let previous = u64::from_le_bytes(previous_output_value);
        let expected_previous = DEPOSIT_UTXO_VALUE - deposit.redemption_fee;
        if previous != expected_previous {
            return Err(ChainError::TransactionReverted {
                method: "IncreaseRedemptionFee",
                reason: format!(
                    "wrong previous output value; expected [{expected_previous}], got [{previous}]"
                ),
            });
        }
        let new = u64::from_le_bytes(new_output_value);
        if new != expected_previous - initial_fee {
            return Err(ChainError::TransactionReverted {
                method: "IncreaseRedemptionFee",
                reason: format!(
                    "wrong new output value; expected [{}], got [{new}]",
                    expected_previous - initial_fee
                ),
            });
        }

        let keep_id = deposit.keep_id;
        state.request_signature(keep_id, digest)?;
        let block = state.block;

        let deposit = state.deposit_mut(deposit_id)?;
        deposit.redemption_fee += initial_fee;
        deposit.redemption_digest = Some(digest);
        deposit.redemption_signature = None;
        deposit.state = DepositState::AwaitingRedemptionSignature;
        let requested_fee = deposit.redemption_fee;
        deposit.redemption_requested_events.push(
            DepositRedemptionRequestedEvent {
                deposit_id,
                digest,
                utxo_value: DEPOSIT_UTXO_VALUE,
                redeemer_output_script: Vec::new(),
                requested_fee,
                outpoint: Vec::new(),
                block_number: block,
            },
        );
        broadcast(&mut state.deposit_redemption_requested_subs, deposit_id);
        Ok(())
    }

    async fn provide_redemption_proof(
        &self,
        deposit_id: DepositId,
        proof: RedemptionProof,
    ) -> Result<(), ChainError> {
        let mut state = self.state();
        let deposit = state.deposit_mut(deposit_id)?;
        if deposit.redemption_proof.is_some() {
            return Err(ChainError::TransactionReverted {
                method: "ProvideRedemptionProof",
                reason: format!("redemption proof for deposit [{deposit_id}] already provided"),
            });
        }
        deposit.redemption_proof = Some(proof);
        deposit.state = DepositState::Redeemed;
        broadcast(&mut state.deposit_redeemed_subs, deposit_id);
        Ok(())
    }
}
