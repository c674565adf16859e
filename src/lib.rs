//! SysOps Bot
//!
//! Telegram bot that pulls phone numbers and emails out of free text,
//! rates passwords, and runs read-only diagnostics on a remote Linux host.
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► telegram ──► CommandDispatcher ──┬── ConversationEngine ── SessionStore
//!                                               │          │
//!                                               │          ├── extract
//!                                               ├──────────┼── PersistenceGateway ── Postgres / SQLite
//!                                               └──────────┴── RemoteGateway ── SSH
//! ```

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod extract;
pub mod messages;
pub mod remote;
pub mod session;
pub mod store;
pub mod telegram;
pub mod telegram_ui;

pub use config::{Config, StoreBackend};
pub use dispatcher::{CommandDispatcher, Inbound, InboundEvent};
pub use engine::{ConversationEngine, EngineEvent, PackageChoice};
pub use extract::ExtractionResult;
pub use messages::{Keyboard, Reply};
pub use remote::{
    RemoteCommand, RemoteCommandResult, RemoteError, RemoteExecutor, RemoteGateway, SshExecutor,
    SshSettings,
};
pub use session::{ConversationState, SessionStore, UserId, Workflow};
pub use store::{
    PersistenceGateway, PostgresSettings, PostgresStore, RecordKind, RecordStore, SqliteStore,
    StoreError,
};
