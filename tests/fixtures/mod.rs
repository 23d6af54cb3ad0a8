//! Shared fixtures: a small company table, configured actors and engines
//! wired over in-memory storage.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dashboard_remarks::access::{AccessPolicy, Actor, Role, RolePolicy, TokenAuthenticator};
use dashboard_remarks::api::AppState;
use dashboard_remarks::config::{AccessConfig, ActorConfig};
use dashboard_remarks::records::{StaticTableSource, Table, TableRecordStore};
use dashboard_remarks::store::{InMemoryRepository, RemarkRepository};
use dashboard_remarks::workflows::{StageCatalog, WorkflowEngine};

/// Six companies; record ids 0..=5.
pub fn companies_table() -> Table {
    #[derive(serde::Deserialize)]
    struct Raw {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    }

    let raw: Raw = serde_json::from_str(include_str!("companies.json"))
        .expect("Failed to parse companies fixture");
    let mut values = vec![raw.columns];
    values.extend(raw.rows);
    Table::from_values(values).expect("companies fixture has a header")
}

pub const RECORD_COUNT: u64 = 6;

pub fn access_config() -> AccessConfig {
    let actor = |name: &str, role| ActorConfig {
        name: name.to_string(),
        role,
        token: format!("{name}-token"),
    };
    AccessConfig {
        actors: vec![
            actor("alice", Role::Admin),
            actor("bob", Role::Editor),
            actor("carol", Role::Viewer),
        ],
    }
}

pub fn alice() -> Actor {
    Actor::new("alice")
}

pub fn bob() -> Actor {
    Actor::new("bob")
}

pub fn carol() -> Actor {
    Actor::new("carol")
}

pub fn record_store() -> Arc<TableRecordStore> {
    Arc::new(TableRecordStore::new(
        Arc::new(StaticTableSource::new(companies_table())),
        Duration::from_secs(60),
    ))
}

pub fn engine_with(
    policy: Arc<dyn AccessPolicy>,
    repository: Arc<dyn RemarkRepository>,
) -> WorkflowEngine {
    WorkflowEngine::new(
        Arc::new(StageCatalog::default()),
        record_store(),
        repository,
        policy,
    )
}

/// Engine using role-based access over fresh in-memory storage.
pub fn role_engine() -> WorkflowEngine {
    engine_with(
        Arc::new(RolePolicy::from_config(&access_config())),
        Arc::new(InMemoryRepository::new()),
    )
}

pub fn app_state() -> Arc<AppState> {
    let records = record_store();
    let engine = WorkflowEngine::new(
        Arc::new(StageCatalog::default()),
        records.clone(),
        Arc::new(InMemoryRepository::new()),
        Arc::new(RolePolicy::from_config(&access_config())),
    );
    Arc::new(AppState {
        engine: Arc::new(engine),
        records,
        authenticator: TokenAuthenticator::from_config(&access_config()),
        default_limit: 100,
    })
}
