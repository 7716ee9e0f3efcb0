// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tessera Admin - Registration & Composition Core
//!
//! This crate turns declarative descriptors into an administrative back
//! office. Hosts register panels, modules, dashboard widgets, commands,
//! search adapters and menu items on an [`Admin`], then bind it onto an
//! axum router.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         Host application                             │
//! │           (modules, repositories, widgets, commands)                 │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                  │ register (configuring phase)
//!                                  ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Admin                                   │
//! │  ┌──────────┐ ┌───────────┐ ┌──────────┐ ┌────────┐ ┌────────────┐   │
//! │  │  Panels  │ │ Dashboard │ │ Commands │ │ Search │ │ Jobs/Menu  │   │
//! │  └──────────┘ └───────────┘ └──────────┘ └────────┘ └────────────┘   │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                  │ initialize (freeze + bind)
//!                                  ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │   <base_path>/api/...   authenticate → resolve → authorize → dispatch │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # HTTP API
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET api/<panel>` | List with `page`, `per_page`, filters and `_search` |
//! | `POST api/<panel>` | Create |
//! | `GET api/<panel>/<id>` | Detail |
//! | `PATCH api/<panel>/<id>` | Partial update |
//! | `DELETE api/<panel>/<id>` | Delete |
//! | `POST api/<panel>/actions/<action>` | Run a panel action |
//! | `POST api/<panel>/bulk/<action>` | Run a bulk action on `ids` |
//! | `GET api/panels` | Panel descriptors |
//! | `GET api/dashboard` | Widgets for the current user |
//! | `GET api/search?query=` | Federated search |
//! | `GET api/jobs` | Jobs with their last status |
//! | `POST api/jobs/<name>/trigger` | Trigger a job |
//! | `GET api/navigation` | Menu tree for user and locale |
//! | `GET/PATCH api/settings` | Settings for the caller's scope |
//! | `GET api/notifications` | Caller's inbox |
//!
//! Errors use the envelope `{"error": {"code", "message"}}`; see
//! [`error::ErrorKind`] for the status mapping.
//!
//! # Feature gating
//!
//! [`config::Features`] switches `dashboard`, `search`, `cms`, `commands` and
//! `jobs`. A disabled feature leaves its registrar in place but inert:
//! registrations succeed and have no effect.

pub mod admin;
pub mod auth;
pub mod cms;
pub mod commands;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod descriptor;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod menu;
pub mod module;
pub mod notifications;
pub mod panel;
pub mod record;
pub mod repository;
pub mod search;
pub mod server;
pub mod settings;

pub use admin::{Admin, AdminRuntime};
pub use config::{Config, Features};
pub use context::{AdminContext, Scope};
pub use error::{AdminError, ErrorKind, Result};
pub use panel::{Panel, PanelBuilder};
pub use record::{Record, Value};
pub use repository::{ListOptions, ListResult, MemoryRepository, Repository};
