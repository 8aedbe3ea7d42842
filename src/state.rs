// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::AccessGate;
use crate::channels::ChannelManager;
use crate::identities::IdentityService;
use crate::storage::Store;
use crate::watcher::LedgerSource;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub manager: Arc<ChannelManager>,
    pub identities: Arc<IdentityService>,
    pub gate: AccessGate,
    pub ledger: Arc<dyn LedgerSource>,
}

impl AppState {
    pub fn new(
        manager: Arc<ChannelManager>,
        identities: Arc<IdentityService>,
        ledger: Arc<dyn LedgerSource>,
    ) -> Self {
        let store = manager.store().clone();
        Self {
            gate: AccessGate::new(store.clone()),
            store,
            manager,
            identities,
            ledger,
        }
    }
}
