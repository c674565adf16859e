//! Conversation Sessions
//!
//! One `Session` per user, held in memory only. A restart drops every
//! in-flight conversation.

use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;

use crate::extract::ExtractionResult;
use crate::store::RecordKind;

/// Chat user identity (Telegram user id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Multi-turn command flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workflow {
    FindPhoneNumbers,
    FindEmails,
    VerifyPassword,
    PackageLookup,
}

impl Workflow {
    /// Entry command name, without the leading `/`
    pub fn command(&self) -> &'static str {
        match self {
            Self::FindPhoneNumbers => "find_phone_number",
            Self::FindEmails => "find_email",
            Self::VerifyPassword => "verify_password",
            Self::PackageLookup => "get_apt_list",
        }
    }

    pub fn from_command(name: &str) -> Option<Self> {
        match name {
            "find_phone_number" => Some(Self::FindPhoneNumbers),
            "find_email" => Some(Self::FindEmails),
            "verify_password" => Some(Self::VerifyPassword),
            "get_apt_list" => Some(Self::PackageLookup),
            _ => None,
        }
    }

    /// State entered by the entry command
    pub fn first_state(&self) -> ConversationState {
        match self {
            Self::FindPhoneNumbers => {
                ConversationState::Extraction(RecordKind::Phone, ExtractionStage::AwaitingText)
            }
            Self::FindEmails => {
                ConversationState::Extraction(RecordKind::Email, ExtractionStage::AwaitingText)
            }
            Self::VerifyPassword => ConversationState::PasswordAwaitingText,
            Self::PackageLookup => ConversationState::Package(PackageStage::AwaitingChoice),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    AwaitingText,
    AwaitingConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStage {
    AwaitingChoice,
    AwaitingPackageName,
}

/// Where a user is in their current workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    /// Phone or email family
    Extraction(RecordKind, ExtractionStage),
    PasswordAwaitingText,
    Package(PackageStage),
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// States in which the next free-text message is consumed
    pub fn consumes_text(&self) -> bool {
        matches!(
            self,
            Self::Extraction(..)
                | Self::PasswordAwaitingText
                | Self::Package(PackageStage::AwaitingPackageName)
        )
    }
}

/// Keys of workflow-local scratch values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchKey {
    PendingPhoneNumbers,
    PendingEmails,
}

impl ScratchKey {
    pub fn pending(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Phone => Self::PendingPhoneNumbers,
            RecordKind::Email => Self::PendingEmails,
        }
    }
}

/// Per-user conversation state
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub state: ConversationState,
    pub scratch: HashMap<ScratchKey, ExtractionResult>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            state: ConversationState::Idle,
            scratch: HashMap::new(),
        }
    }

    /// Start a workflow, discarding whatever was in progress
    pub fn begin(&mut self, workflow: Workflow) {
        self.scratch.clear();
        self.state = workflow.first_state();
    }

    /// Terminal transition: back to idle with empty scratch
    pub fn finish(&mut self) {
        self.scratch.clear();
        self.state = ConversationState::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle() && self.scratch.is_empty()
    }
}

/// Shared map of sessions; every read-modify-write happens under one lock.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a user's state (idle if unknown)
    pub async fn state(&self, user_id: UserId) -> ConversationState {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user_id)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Mutate a user's session atomically, creating it on first use.
    /// Sessions that end up idle are dropped from the map.
    pub async fn update<F, R>(&self, user_id: UserId, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(user_id));
        let result = f(session);

        if session.is_idle() {
            sessions.remove(&user_id);
        }
        result
    }

    /// Number of users with a workflow in progress
    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
