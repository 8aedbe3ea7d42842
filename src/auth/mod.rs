// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Credential-based access for channel operations.
//!
//! ## Auth Flow
//!
//! 1. An identity is registered (explicitly via `/register`, or by the
//!    ledger watcher on first funding) and receives a random credential once
//! 2. The client sends `x-api-key: <credential>` on authenticated routes
//! 3. The server:
//!    - narrows candidates by the credential's lookup tag
//!    - verifies each candidate's Argon2 hash in turn
//!    - binds the matching wallet address as the request identity
//!
//! ## Security
//!
//! - Only Argon2id hashes of credentials are persisted
//! - Missing credential is 401, unknown credential is 403
//! - Authentication failures are audited

pub mod credentials;
pub mod error;
pub mod extractor;
pub mod gate;

pub use error::AuthError;
pub use extractor::{Auth, CREDENTIAL_HEADER};
pub use gate::{AccessGate, AuthenticatedIdentity};
