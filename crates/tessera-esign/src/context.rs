// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution context carried by every e-sign call.

use tessera_admin::Scope;
use tokio_util::sync::CancellationToken;

use crate::error::{EsignError, Result};

/// Scope plus the caller's cancellation signal.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub scope: Scope,
    cancel: CancellationToken,
}

impl JobContext {
    /// Context tied to `cancel`.
    pub fn new(scope: Scope, cancel: CancellationToken) -> Self {
        Self { scope, cancel }
    }

    /// Context that is never cancelled by a caller. Queue workers use this.
    pub fn background(scope: Scope) -> Self {
        Self::new(scope, CancellationToken::new())
    }

    /// Context for a tenant and org.
    pub fn for_scope(tenant_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self::background(Scope::new(tenant_id, org_id))
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast when the caller has gone away.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(EsignError::Cancelled)
        } else {
            Ok(())
        }
    }
}
