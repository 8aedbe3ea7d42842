// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use serde_json::json;
use tempfile::TempDir;

use crate::blockchain::escrow::{
    AccountData, AccountKind, CloseChannelArgs, EscrowProgram, EscrowReceipt, MemoryAccount,
    NpcKey, NpcStateAccount, OpenChannelArgs, PaymentChannelAccount, TemplateAccount,
};
use crate::blockchain::keys::pubkey_of;
use crate::blockchain::rpc::{ParsedTransaction, RpcError, SignatureInfo};
use crate::blockchain::{EscrowClient, EscrowError, Pubkey, SYSTEM_PROGRAM_ID};
use crate::dialogue::{DialogueError, DialogueGenerator};
use crate::storage::{JsonStorage, Store, StoragePaths};
use crate::watcher::LedgerSource;

/// Fresh store on a temporary directory.
pub fn test_store() -> (TempDir, Arc<Store>) {
    let temp = TempDir::new().unwrap();
    let mut storage = JsonStorage::new(StoragePaths::new(temp.path()));
    storage.initialize().unwrap();
    (temp, Arc::new(Store::new(Arc::new(storage))))
}

/// Deterministic keypair from a one-byte seed.
pub fn keypair(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn wallet(seed: u8) -> Pubkey {
    pubkey_of(&keypair(seed))
}

/// Parsed system-program transfer, as returned by `getTransaction`.
pub fn transfer_tx(from: &Pubkey, to: &Pubkey, lamports: u64, failed: bool) -> ParsedTransaction {
    serde_json::from_value(json!({
        "slot": 10,
        "blockTime": 1_700_000_000,
        "meta": { "err": if failed { json!({"InstructionError": [0, "Custom"]}) } else { json!(null) } },
        "transaction": {
            "signatures": ["ignored"],
            "message": {
                "accountKeys": [
                    { "pubkey": from.to_string(), "signer": true, "writable": true },
                    { "pubkey": to.to_string(), "signer": false, "writable": true },
                    { "pubkey": SYSTEM_PROGRAM_ID.to_string(), "signer": false, "writable": false }
                ],
                "instructions": [{
                    "program": "system",
                    "programId": SYSTEM_PROGRAM_ID.to_string(),
                    "parsed": {
                        "type": "transfer",
                        "info": {
                            "source": from.to_string(),
                            "destination": to.to_string(),
                            "lamports": lamports
                        }
                    }
                }]
            }
        }
    }))
    .unwrap()
}

/// A call observed by [`FakeEscrow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscrowCall {
    Open(OpenChannelArgs),
    Close(CloseChannelArgs),
    CreateTemplate(String),
    InitNpc(NpcKey, String),
}

/// Escrow program double keyed by account address.
pub struct FakeEscrow {
    service: SigningKey,
    program: EscrowProgram,
    accounts: Mutex<HashMap<Pubkey, AccountData>>,
    calls: Mutex<Vec<EscrowCall>>,
    next_signature: AtomicU64,
    pub fail_open: AtomicBool,
    pub fail_close: AtomicBool,
    pub fail_init: AtomicBool,
    /// Delay after an accepted `open_channel` has created its account.
    pub open_delay: Mutex<Option<Duration>>,
}

impl FakeEscrow {
    pub fn new() -> Self {
        Self {
            service: keypair(200),
            program: EscrowProgram::new(wallet(201)),
            accounts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_signature: AtomicU64::new(1),
            fail_open: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            fail_init: AtomicBool::new(false),
            open_delay: Mutex::new(None),
        }
    }

    /// Fake with the `default` template already on-chain.
    pub fn with_default_template() -> Self {
        let escrow = Self::new();
        escrow.put_template("default", "Default NPC", "NEUTRAL");
        escrow
    }

    pub fn put_template(&self, template_id: &str, name: &str, base_behavior: &str) {
        let address = self.program.template_address(template_id).unwrap();
        self.accounts.lock().unwrap().insert(
            address,
            AccountData::Template(TemplateAccount {
                creator: self.service_key(),
                name: name.to_string(),
                base_behavior: base_behavior.to_string(),
            }),
        );
    }

    pub fn put_memory(&self, npc: &NpcKey, data: &str) {
        let address = self.program.memory_address(&self.service_key(), npc).unwrap();
        self.accounts.lock().unwrap().insert(
            address,
            AccountData::Memory(MemoryAccount {
                data: data.to_string(),
            }),
        );
    }

    pub fn put_state(&self, npc: &NpcKey, dialogue: &str, behavior: &str) {
        let address = self.program.state_address(&self.service_key(), npc).unwrap();
        self.accounts.lock().unwrap().insert(
            address,
            AccountData::NpcState(NpcStateAccount {
                creator: self.service_key(),
                npc_id: npc.npc_id.clone(),
                game_id: npc.game_id.clone(),
                dialogue: dialogue.to_string(),
                behavior: behavior.to_string(),
            }),
        );
    }

    pub fn calls(&self) -> Vec<EscrowCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn opens(&self) -> Vec<OpenChannelArgs> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EscrowCall::Open(args) => Some(args),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<CloseChannelArgs> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EscrowCall::Close(args) => Some(args),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EscrowCall) -> EscrowReceipt {
        self.calls.lock().unwrap().push(call);
        let n = self.next_signature.fetch_add(1, Ordering::SeqCst);
        EscrowReceipt {
            signature: format!("sig-{n}"),
        }
    }
}

#[async_trait]
impl EscrowClient for FakeEscrow {
    fn service_key(&self) -> Pubkey {
        pubkey_of(&self.service)
    }

    fn program(&self) -> EscrowProgram {
        self.program
    }

    async fn open_channel(&self, args: OpenChannelArgs) -> Result<EscrowReceipt, EscrowError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(EscrowError::Rejected("open_channel failed".to_string()));
        }
        let address = self
            .program
            .channel_address(&self.service_key(), &args.channel_id)?;
        self.accounts.lock().unwrap().insert(
            address,
            AccountData::PaymentChannel(PaymentChannelAccount {
                owner: self.service_key(),
                counter_party: args.counterparty,
                balance: args.amount,
                hashlock: args.hashlock,
                timelock: args.timelock,
                template_creator: self.service_key(),
            }),
        );
        let receipt = self.record(EscrowCall::Open(args));

        let delay = *self.open_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(receipt)
    }

    async fn close_channel(&self, args: CloseChannelArgs) -> Result<EscrowReceipt, EscrowError> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(EscrowError::Rejected("close_channel failed".to_string()));
        }
        Ok(self.record(EscrowCall::Close(args)))
    }

    async fn create_template(
        &self,
        template_id: &str,
        name: &str,
        base_behavior: &str,
    ) -> Result<EscrowReceipt, EscrowError> {
        self.put_template(template_id, name, base_behavior);
        Ok(self.record(EscrowCall::CreateTemplate(template_id.to_string())))
    }

    async fn init_npc(&self, npc: &NpcKey, template_id: &str) -> Result<EscrowReceipt, EscrowError> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(EscrowError::Rejected("init_npc failed".to_string()));
        }
        self.put_memory(npc, "");
        self.put_state(npc, "", "NEUTRAL");
        Ok(self.record(EscrowCall::InitNpc(npc.clone(), template_id.to_string())))
    }

    async fn fetch_account(
        &self,
        _kind: AccountKind,
        address: &Pubkey,
    ) -> Result<Option<AccountData>, EscrowError> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }
}

/// Dialogue double returning a canned reply.
pub struct FakeDialogue {
    reply: Mutex<Result<String, String>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeDialogue {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Mutex::new(Ok(reply.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Mutex::new(Err(message.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialogueGenerator for FakeDialogue {
    async fn complete(&self, prompt: &str) -> Result<String, DialogueError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .lock()
            .unwrap()
            .clone()
            .map_err(DialogueError::Request)
    }
}

/// Ledger double: a scripted slot sequence plus a fixed transaction set.
pub struct FakeLedger {
    slots: Mutex<VecDeque<u64>>,
    last_slot: AtomicU64,
    signatures: Mutex<Vec<SignatureInfo>>,
    transactions: Mutex<HashMap<String, ParsedTransaction>>,
    fetches: Mutex<Vec<String>>,
    pub fail_signatures: AtomicBool,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(VecDeque::new()),
            last_slot: AtomicU64::new(0),
            signatures: Mutex::new(Vec::new()),
            transactions: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            fail_signatures: AtomicBool::new(false),
        }
    }

    /// Queue slots returned by successive `current_slot` calls. The last
    /// one repeats once the queue is drained.
    pub fn push_slots(&self, slots: &[u64]) {
        self.slots.lock().unwrap().extend(slots.iter().copied());
    }

    pub fn add_transaction(&self, signature: &str, tx: ParsedTransaction) {
        self.signatures.lock().unwrap().push(SignatureInfo {
            signature: signature.to_string(),
            slot: tx.slot,
            err: None,
        });
        self.transactions
            .lock()
            .unwrap()
            .insert(signature.to_string(), tx);
    }

    /// Signature listed for the address but with no retrievable detail.
    pub fn add_missing(&self, signature: &str) {
        self.signatures.lock().unwrap().push(SignatureInfo {
            signature: signature.to_string(),
            slot: 0,
            err: None,
        });
    }

    /// Signatures whose detail was fetched, in order.
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerSource for FakeLedger {
    async fn current_slot(&self) -> Result<u64, RpcError> {
        if let Some(slot) = self.slots.lock().unwrap().pop_front() {
            self.last_slot.store(slot, Ordering::SeqCst);
        }
        Ok(self.last_slot.load(Ordering::SeqCst))
    }

    async fn recent_signatures(
        &self,
        _address: &Pubkey,
        _limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        if self.fail_signatures.load(Ordering::SeqCst) {
            return Err(RpcError::Transport("connection refused".to_string()));
        }
        Ok(self.signatures.lock().unwrap().clone())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>, RpcError> {
        self.fetches.lock().unwrap().push(signature.to_string());
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }
}
