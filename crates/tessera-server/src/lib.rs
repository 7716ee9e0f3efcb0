// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tessera Server - Demo Back Offices
//!
//! Hosts one of three applications built on `tessera-admin`:
//!
//! | App | Contents |
//! |-----|----------|
//! | `web` | Users, CMS pages/contents/blocks, site settings |
//! | `commerce` | Products, orders, sales widgets, hourly restock job |
//! | `esign` | Agreements, finalization command, persisted job runs |
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TESSERA_BIND_ADDR` | `0.0.0.0:8080` | HTTP listen address |
//! | `TESSERA_APP` | `commerce` | Application to serve |
//! | `TESSERA_ESIGN_DATABASE_URL` | - | SQLite URL for e-sign job runs, email logs and audit events |
//!
//! Admin (`TESSERA_ADMIN_*`) and e-sign (`ESIGN_*`) variables are documented
//! in their crates.

pub mod apps;
pub mod config;

pub use apps::{App, build};
pub use config::{AppKind, ConfigError, ServerConfig};
