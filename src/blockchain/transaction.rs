// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legacy transaction signing for the service key.
//!
//! Messages are compiled by `solana_program::message::Message`; the service
//! key is the fee payer and the only signer, so the wire format is the
//! single-entry signature list followed by the serialized message.

use ed25519_dalek::{Signer, SigningKey};
use solana_program::hash::Hash;
use solana_program::message::Message;

use super::keys::pubkey_of;
use super::types::{Instruction, Pubkey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("Transaction needs {0} signatures, only the fee payer can sign")]
    UnsupportedSigners(u8),

    #[error("Signer {signer} is not the fee payer {payer}")]
    WrongSigner { signer: Pubkey, payer: Pubkey },
}

/// A signed transaction ready for `sendTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub signature: [u8; 64],
    pub message: Message,
}

impl SignedTransaction {
    /// Compile `instructions` with `signer` as fee payer and sign them.
    pub fn sign(
        instructions: &[Instruction],
        signer: &SigningKey,
        recent_blockhash: [u8; 32],
    ) -> Result<Self, TransactionError> {
        let payer = pubkey_of(signer);
        let message = Message::new_with_blockhash(
            instructions,
            Some(&payer),
            &Hash::new_from_array(recent_blockhash),
        );

        let required = message.header.num_required_signatures;
        if required != 1 {
            return Err(TransactionError::UnsupportedSigners(required));
        }
        if let Some(first) = message.account_keys.first() {
            if *first != payer {
                return Err(TransactionError::WrongSigner {
                    signer: payer,
                    payer: *first,
                });
            }
        }

        let signature = signer.sign(&message.serialize());
        Ok(Self {
            signature: signature.to_bytes(),
            message,
        })
    }

    /// Base58 of the signature; this is the transaction id.
    pub fn id(&self) -> String {
        bs58::encode(self.signature).into_string()
    }

    /// Wire bytes: compact length (1), signature, message.
    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut out = Vec::with_capacity(1 + 64 + message.len());
        out.push(1);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&message);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::{AccountMeta, SYSTEM_PROGRAM_ID};
    use ed25519_dalek::{Signature, Verifier};

    fn sample(payer: Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_from_array([9u8; 32]),
            &[1, 2, 3],
            vec![
                AccountMeta::new_readonly(Pubkey::new_from_array([4u8; 32]), false),
                AccountMeta::new(payer, true),
                AccountMeta::new(Pubkey::new_from_array([5u8; 32]), false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
        )
    }

    #[test]
    fn payer_leads_and_header_counts_signers() {
        let key = SigningKey::from_bytes(&[2u8; 32]);
        let payer = pubkey_of(&key);
        let tx = SignedTransaction::sign(&[sample(payer)], &key, [7u8; 32]).unwrap();

        assert_eq!(tx.message.account_keys[0], payer);
        assert_eq!(tx.message.account_keys.len(), 5);
        assert_eq!(tx.message.header.num_required_signatures, 1);
        assert_eq!(tx.message.header.num_readonly_signed_accounts, 0);
        assert_eq!(tx.message.header.num_readonly_unsigned_accounts, 3);
        assert_eq!(tx.message.recent_blockhash, Hash::new_from_array([7u8; 32]));
    }

    #[test]
    fn signature_verifies_over_message() {
        let key = SigningKey::from_bytes(&[2u8; 32]);
        let payer = pubkey_of(&key);
        let tx = SignedTransaction::sign(&[sample(payer)], &key, [0u8; 32]).unwrap();

        let signature = Signature::from_bytes(&tx.signature);
        key.verifying_key()
            .verify(&tx.message.serialize(), &signature)
            .unwrap();

        let wire = tx.serialize();
        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], &tx.signature);
        assert_eq!(&wire[65..], tx.message.serialize().as_slice());
        assert_eq!(bs58::decode(tx.id()).into_vec().unwrap(), tx.signature.to_vec());
    }

    #[test]
    fn rejects_instructions_needing_a_second_signer() {
        let key = SigningKey::from_bytes(&[2u8; 32]);
        let other = Pubkey::new_from_array([8u8; 32]);

        assert!(matches!(
            SignedTransaction::sign(&[sample(other)], &key, [0u8; 32]),
            Err(TransactionError::UnsupportedSigners(2))
        ));
    }
}
