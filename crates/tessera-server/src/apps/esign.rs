// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! E-sign back office: agreements, finalization and job runs.

use std::sync::Arc;

use tessera_admin::descriptor::{Action, Field, FieldType, Filter, PanelPermissions};
use tessera_admin::jobs::JobDefinition;
use tessera_admin::menu::MenuItem;
use tessera_admin::search::RepositorySearchAdapter;
use tessera_admin::{Admin, PanelBuilder, Result};
use tessera_esign::admin::{
    AgreementRepository, COMPLETE_AGREEMENT_COMMAND, CompleteAgreementCommand, JobRunStatusSource,
};
use tessera_esign::artifacts::{ImportedFile, StaticGoogleImporter};
use tessera_esign::jobs::{
    EMAIL_SEND_SIGNING_REQUEST, GOOGLE_DRIVE_IMPORT, PDF_GENERATE_CERTIFICATE,
    PDF_GENERATE_EXECUTED, PDF_RENDER_PAGES, TOKEN_ROTATE,
};
use tessera_esign::store::SqliteStore;
use tessera_esign::tokens::InMemoryTokenService;
use tessera_esign::{CompletionWorkflow, EsignConfig, EsignJobs, Stores};
use tracing::info;

pub const AGREEMENTS_PANEL: &str = "agreements";

const JOBS: [(&str, &str); 6] = [
    (EMAIL_SEND_SIGNING_REQUEST, "Send signing, reminder and completion emails"),
    (PDF_RENDER_PAGES, "Render signed pages"),
    (PDF_GENERATE_EXECUTED, "Generate the executed PDF"),
    (PDF_GENERATE_CERTIFICATE, "Generate the certificate of completion"),
    (TOKEN_ROTATE, "Rotate recipient link tokens"),
    (GOOGLE_DRIVE_IMPORT, "Import documents from Google Drive"),
];

/// Open the esign stores: SQLite when `database_url` is set, memory otherwise.
pub async fn open_stores(database_url: Option<&str>) -> Result<Stores> {
    match database_url {
        Some(url) => {
            let store = SqliteStore::connect(url).await?;
            info!("E-sign stores connected to SQLite");
            Ok(Stores::sqlite(store))
        }
        None => {
            info!("E-sign stores kept in memory");
            Ok(Stores::memory())
        }
    }
}

/// Google Drive file the demo importer serves.
pub const DEMO_DRIVE_FILE_ID: &str = "demo-mutual-nda";

/// Demo importer holding one Drive file.
pub fn demo_importer() -> StaticGoogleImporter {
    StaticGoogleImporter::new().with_file(
        DEMO_DRIVE_FILE_ID,
        ImportedFile {
            title: "Mutual NDA.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 48_213,
        },
    )
}

/// Wire jobs for `stores` with the configured email transport.
pub fn jobs(stores: Stores, config: &EsignConfig) -> EsignJobs {
    EsignJobs::builder(stores)
        .config(config)
        .token_service(Arc::new(InMemoryTokenService::new()))
        .google_importer(Arc::new(demo_importer()))
        .build()
}

/// Register the e-sign admin onto `admin`.
pub fn register(admin: &mut Admin, jobs: EsignJobs) -> Result<()> {
    let stores = jobs.stores().clone();
    let agreements = Arc::new(AgreementRepository::new(stores.agreements.clone()));

    let status = Field::select("status", "Status")
        .option("draft", "Draft")
        .option("sent", "Sent")
        .option("completed", "Completed");

    admin.register_panel(
        AGREEMENTS_PANEL,
        PanelBuilder::new("Agreements")
            .with_repository(agreements.clone())
            .list_fields([
                Field::text("title", "Title").required(),
                status.clone(),
                Field::number("recipients", "Recipients").read_only(),
                Field::new("completed_at", "Completed", FieldType::Datetime).read_only(),
            ])
            .form_fields([Field::text("title", "Title").required(), status])
            .detail_fields([
                Field::text("title", "Title"),
                Field::text("status", "Status"),
                Field::number("recipients", "Recipients"),
                Field::number("rendered_pages", "Pages"),
                Field::text("executed_object_key", "Executed PDF"),
                Field::text("certificate_object_key", "Certificate"),
                Field::new("created_at", "Created", FieldType::Datetime),
                Field::new("completed_at", "Completed", FieldType::Datetime),
            ])
            .filters([
                Filter::search(),
                Filter::new("status", "Status", FieldType::Select),
            ])
            .actions([Action::new("complete", "Complete")
                .command(COMPLETE_AGREEMENT_COMMAND)
                .permission("agreements.complete")
                .confirm("Finalize this agreement and send it to every CC?")
                .variant("primary")])
            .permissions(PanelPermissions::prefixed(AGREEMENTS_PANEL)),
    )?;

    admin.register_search_adapter(
        AGREEMENTS_PANEL,
        Arc::new(
            RepositorySearchAdapter::new("agreement", agreements, "title", "/agreements")
                .description_field("status")
                .icon("file-signature"),
        ),
    )?;

    admin.register_command(Arc::new(CompleteAgreementCommand::new(
        CompletionWorkflow::new(jobs),
    )))?;

    for (name, description) in JOBS {
        admin.register_job(JobDefinition::new(name, description))?;
    }
    admin.with_job_status_source(Arc::new(JobRunStatusSource::new(stores.job_runs.clone())))?;

    admin.add_menu_item(
        MenuItem::panel("esign.agreements", "Agreements", AGREEMENTS_PANEL)
            .icon("file-signature")
            .permission("agreements.view"),
    )?;
    admin.add_menu_item(MenuItem::link("esign.jobs", "Jobs", "/jobs").icon("activity"))?;

    Ok(())
}
