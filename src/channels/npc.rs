// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NPC actions paid for from a channel, and template management.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::manager::{ChannelManager, SpendReceipt, SPEND_PER_ACTION};
use super::ChannelError;
use crate::blockchain::escrow::{EscrowReceipt, NpcKey, NpcStateAccount};
use crate::blockchain::ClientInstruction;
use crate::dialogue::{npc_prompt, split_reply, DEFAULT_BEHAVIOR};
use crate::storage::{AuditEvent, AuditEventType};

/// Name given to templates created on demand.
pub const DEFAULT_TEMPLATE_NAME: &str = "Default NPC";

/// One paid NPC action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcActionRequest {
    pub npc: NpcKey,
    pub action: String,
    pub channel_id: String,
    pub template_id: String,
}

impl NpcActionRequest {
    fn validate(&self) -> Result<(), ChannelError> {
        let fields = [
            &self.npc.npc_id,
            &self.npc.game_id,
            &self.action,
            &self.channel_id,
            &self.template_id,
        ];
        if fields.iter().any(|field| field.trim().is_empty()) {
            return Err(ChannelError::Validation("Missing required fields".to_string()));
        }
        Ok(())
    }
}

/// What the action did once paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NpcOutcome {
    /// First action on this NPC: its memory and state accounts were created.
    Initialized { transaction: String },
    /// Instruction recording the action, for the caller to submit.
    Updated {
        instruction: ClientInstruction,
        dialogue: String,
        behavior: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NpcActionResult {
    pub channel: SpendReceipt,
    #[serde(flatten)]
    pub outcome: NpcOutcome,
}

impl ChannelManager {
    /// Charge [`SPEND_PER_ACTION`] and apply `request.action` to the NPC.
    ///
    /// The debit is committed first; a failure afterwards is reported but
    /// the channel stays debited.
    pub async fn npc_action(
        &self,
        request: &NpcActionRequest,
        identity: &str,
    ) -> Result<NpcActionResult, ChannelError> {
        request.validate()?;

        let channel = self
            .spend(&request.channel_id, identity, SPEND_PER_ACTION)
            .await?;

        let outcome = self.apply_action(request).await.inspect_err(|e| {
            warn!(
                channel_id = %request.channel_id,
                npc_id = %request.npc.npc_id,
                error = %e,
                "NPC action failed after debit"
            );
        })?;

        Ok(NpcActionResult { channel, outcome })
    }

    async fn apply_action(&self, request: &NpcActionRequest) -> Result<NpcOutcome, ChannelError> {
        let memory = self
            .bounded("fetch_memory", self.escrow.fetch_memory(&request.npc))
            .await?;

        let Some(memory) = memory else {
            let receipt = self
                .bounded(
                    "init_npc",
                    self.escrow.init_npc(&request.npc, &request.template_id),
                )
                .await?;
            info!(
                npc_id = %request.npc.npc_id,
                game_id = %request.npc.game_id,
                transaction = %receipt.signature,
                "NPC initialized"
            );
            return Ok(NpcOutcome::Initialized {
                transaction: receipt.signature,
            });
        };

        let prompt = npc_prompt(&memory.data, &request.action);
        let text = self
            .bounded("dialogue", self.dialogue.complete(&prompt))
            .await?;
        let reply = split_reply(&text);

        let instruction = self.escrow.update_npc(
            &request.npc,
            &request.action,
            &reply.dialogue,
            &reply.behavior,
        )?;

        Ok(NpcOutcome::Updated {
            instruction: instruction.into(),
            dialogue: reply.dialogue,
            behavior: reply.behavior,
        })
    }

    /// Current dialogue and behavior of an NPC.
    pub async fn npc_state(&self, npc: &NpcKey) -> Result<NpcStateAccount, ChannelError> {
        if npc.npc_id.trim().is_empty() || npc.game_id.trim().is_empty() {
            return Err(ChannelError::Validation(
                "Missing required query parameters".to_string(),
            ));
        }
        self.bounded("fetch_npc_state", self.escrow.fetch_npc_state(npc))
            .await?
            .ok_or_else(|| ChannelError::NotFound("NPC state".to_string()))
    }

    /// Create an NPC template owned by the service key.
    pub async fn create_template(
        &self,
        template_id: &str,
        name: &str,
        base_behavior: &str,
        identity: &str,
    ) -> Result<EscrowReceipt, ChannelError> {
        if [template_id, name, base_behavior]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(ChannelError::Validation("Missing required fields".to_string()));
        }

        let event = AuditEvent::new(AuditEventType::TemplateCreated)
            .with_identity(identity)
            .with_resource("template", template_id);

        let result = self
            .bounded(
                "create_template",
                self.escrow.create_template(template_id, name, base_behavior),
            )
            .await;

        match &result {
            Ok(receipt) => {
                info!(template_id = %template_id, transaction = %receipt.signature, "Template created");
                self.store.audit().record(event.with_details(json!({
                    "name": name,
                    "base_behavior": base_behavior,
                    "transaction": receipt.signature,
                })));
            }
            Err(e) => self.store.audit().record(event.failed(e.to_string())),
        }
        result
    }

    /// Make sure `template_id` exists on-chain, creating it if absent.
    ///
    /// Returns whether a template was created.
    pub async fn ensure_template(&self, template_id: &str) -> Result<bool, ChannelError> {
        let existing = self
            .bounded("fetch_template", self.escrow.fetch_template(template_id))
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let receipt = self
            .bounded(
                "create_template",
                self.escrow
                    .create_template(template_id, DEFAULT_TEMPLATE_NAME, DEFAULT_BEHAVIOR),
            )
            .await?;
        info!(template_id = %template_id, transaction = %receipt.signature, "Default template created");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::EscrowClient;
    use crate::channels::manager::FundingTransfer;
    use crate::storage::Store;
    use crate::test_support::{test_store, wallet, EscrowCall, FakeDialogue, FakeEscrow};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn npc() -> NpcKey {
        NpcKey {
            npc_id: "guard".to_string(),
            game_id: "castle".to_string(),
        }
    }

    fn request(channel_id: &str) -> NpcActionRequest {
        NpcActionRequest {
            npc: npc(),
            action: "wave".to_string(),
            channel_id: channel_id.to_string(),
            template_id: "default".to_string(),
        }
    }

    async fn funded(
        dialogue: FakeDialogue,
    ) -> (TempDir, Arc<Store>, Arc<FakeEscrow>, Arc<FakeDialogue>, ChannelManager) {
        let (temp, store) = test_store();
        let escrow = Arc::new(FakeEscrow::with_default_template());
        let dialogue = Arc::new(dialogue);
        let manager = ChannelManager::new(
            store.clone(),
            escrow.clone(),
            dialogue.clone(),
            Duration::from_secs(5),
        );
        manager
            .open_funded(
                &FundingTransfer {
                    signature: "c".to_string(),
                    sender: wallet(1),
                    lamports: 1_000_000,
                },
                "default",
            )
            .await
            .unwrap();
        (temp, store, escrow, dialogue, manager)
    }

    #[tokio::test]
    async fn first_action_initializes_npc() {
        let (_temp, _store, escrow, dialogue, manager) = funded(FakeDialogue::replying("x")).await;

        let result = manager
            .npc_action(&request("c"), &wallet(1).to_string())
            .await
            .unwrap();

        assert_eq!(result.channel.balance, 999_000);
        assert_eq!(result.channel.nonce, 1);
        assert!(matches!(result.outcome, NpcOutcome::Initialized { .. }));
        assert!(escrow
            .calls()
            .contains(&EscrowCall::InitNpc(npc(), "default".to_string())));
        assert!(dialogue.prompts().is_empty());
    }

    #[tokio::test]
    async fn later_action_returns_update_instruction() {
        let (_temp, _store, escrow, dialogue, manager) =
            funded(FakeDialogue::replying(" Halt! | HOSTILE")).await;
        escrow.put_memory(&npc(), "wave@1700000000");

        let result = manager
            .npc_action(&request("c"), &wallet(1).to_string())
            .await
            .unwrap();

        match result.outcome {
            NpcOutcome::Updated {
                instruction,
                dialogue: text,
                behavior,
            } => {
                assert_eq!(text, "Halt!");
                assert_eq!(behavior, "HOSTILE");
                assert_eq!(instruction.program_id, escrow.program().program_id());
                assert_eq!(instruction.accounts.len(), 3);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            dialogue.prompts(),
            vec![npc_prompt("wave@1700000000", "wave")]
        );
    }

    #[tokio::test]
    async fn debit_survives_downstream_failure() {
        let (_temp, store, escrow, _dialogue, manager) =
            funded(FakeDialogue::failing("service unavailable")).await;
        escrow.put_memory(&npc(), "");

        let result = manager.npc_action(&request("c"), &wallet(1).to_string()).await;
        assert!(matches!(result, Err(ChannelError::Upstream(_))));

        let record = &store.channels()["c"];
        assert_eq!(record.balance, 999_000);
        assert_eq!(record.nonce, 1);

        assert!(manager
            .npc_action(&request("c"), &wallet(1).to_string())
            .await
            .is_err());
        assert_eq!(store.channels()["c"].balance, 998_000);
    }

    #[tokio::test]
    async fn missing_fields_charge_nothing() {
        let (_temp, store, _escrow, _dialogue, manager) = funded(FakeDialogue::replying("x")).await;
        let mut bad = request("c");
        bad.action = " ".to_string();

        let result = manager.npc_action(&bad, &wallet(1).to_string()).await;
        assert!(matches!(result, Err(ChannelError::Validation(_))));
        assert_eq!(store.channels()["c"].balance, 1_000_000);
    }

    #[tokio::test]
    async fn npc_state_lookup() {
        let (_temp, _store, escrow, _dialogue, manager) = funded(FakeDialogue::replying("x")).await;

        let missing = manager.npc_state(&npc()).await;
        assert!(matches!(missing, Err(ChannelError::NotFound(msg)) if msg == "NPC state"));

        escrow.put_state(&npc(), "Hello", "FRIENDLY");
        let state = manager.npc_state(&npc()).await.unwrap();
        assert_eq!(state.dialogue, "Hello");
        assert_eq!(state.behavior, "FRIENDLY");
    }

    #[tokio::test]
    async fn ensure_template_creates_once() {
        let (_temp, store) = test_store();
        let escrow = Arc::new(FakeEscrow::new());
        let manager = ChannelManager::new(
            store,
            escrow.clone(),
            Arc::new(FakeDialogue::replying("x")),
            Duration::from_secs(5),
        );

        assert!(manager.ensure_template("default").await.unwrap());
        assert!(!manager.ensure_template("default").await.unwrap());

        let template = escrow.fetch_template("default").await.unwrap().unwrap();
        assert_eq!(template.name, DEFAULT_TEMPLATE_NAME);
        assert_eq!(template.base_behavior, DEFAULT_BEHAVIOR);
    }

    #[tokio::test]
    async fn template_creation_is_audited() {
        let (_temp, store, _escrow, _dialogue, manager) = funded(FakeDialogue::replying("x")).await;
        manager
            .create_template("merchant", "Merchant", "FRIENDLY", "creator")
            .await
            .unwrap();

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let events = store
            .audit()
            .search_by_resource("template", "merchant", &today)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::TemplateCreated);

        let invalid = manager.create_template("t", "", "x", "creator").await;
        assert!(matches!(invalid, Err(ChannelError::Validation(_))));
    }
}
