//! Command Dispatcher
//!
//! Routes inbound events to the conversation engine or to a stateless
//! handler. Stateless commands never touch the caller's session, so a
//! diagnostic issued mid-workflow leaves the workflow where it was.

use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{ConversationEngine, EngineEvent, PackageChoice};
use crate::messages::{self, Reply};
use crate::remote::{RemoteCommand, RemoteGateway};
use crate::session::{SessionStore, UserId, Workflow};
use crate::store::{format_rows, PersistenceGateway, RecordKind};

/// What arrived from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `/name args`, with any `@botname` suffix stripped
    Command { name: String, args: String },
    Text(String),
    /// Callback data from an inline button
    Choice(String),
}

#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub user_name: String,
    pub kind: Inbound,
}

impl InboundEvent {
    /// Classify a text message as command or free text
    pub fn from_text(user_id: UserId, user_name: impl Into<String>, text: &str) -> Self {
        let kind = match parse_command(text) {
            Some((name, args)) => Inbound::Command { name, args },
            None => Inbound::Text(text.to_string()),
        };
        Self {
            user_id,
            user_name: user_name.into(),
            kind,
        }
    }

    pub fn choice(user_id: UserId, user_name: impl Into<String>, data: &str) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            kind: Inbound::Choice(data.to_string()),
        }
    }
}

/// Split `/cmd@bot rest` into `("cmd", "rest")`. `None` for non-commands.
/// Command names are case-insensitive and come back lowercased.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let body = text.strip_prefix('/')?;
    let (head, args) = match body.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    Some((name.to_lowercase(), args.to_string()))
}

/// Stateless commands handled outside the conversation engine
#[derive(Debug, Clone, PartialEq, Eq)]
enum DirectCommand {
    Start,
    Help,
    Remote(RemoteCommand),
    ListRecords(RecordKind),
}

impl DirectCommand {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "get_emails" => Some(Self::ListRecords(RecordKind::Email)),
            "get_phone_numbers" => Some(Self::ListRecords(RecordKind::Phone)),
            other => RemoteCommand::from_name(other).map(Self::Remote),
        }
    }
}

/// Entry point for every inbound event
#[derive(Clone)]
pub struct CommandDispatcher {
    engine: ConversationEngine,
    remote: RemoteGateway,
    persistence: PersistenceGateway,
}

impl CommandDispatcher {
    pub fn new(
        sessions: Arc<SessionStore>,
        remote: RemoteGateway,
        persistence: PersistenceGateway,
    ) -> Self {
        Self {
            engine: ConversationEngine::new(sessions, persistence.clone(), remote.clone()),
            remote,
            persistence,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.engine.sessions()
    }

    /// Handle one event and return the replies to deliver, in order.
    pub async fn dispatch(&self, event: InboundEvent) -> Vec<Reply> {
        let user_id = event.user_id;

        match event.kind {
            Inbound::Command { name, args } => {
                info!("Command /{} from user {}", name, user_id);
                if !args.is_empty() {
                    debug!("Ignoring arguments to /{}: {:?}", name, args);
                }
                self.handle_command(user_id, &event.user_name, &name).await
            }

            Inbound::Text(text) => {
                match self.engine.handle(user_id, EngineEvent::Text(text.clone())).await {
                    Some(replies) => replies,
                    // Nothing waiting for input: echo
                    None => vec![Reply::text(text)],
                }
            }

            Inbound::Choice(data) => {
                let Some(choice) = PackageChoice::decode(&data) else {
                    debug!("Unknown callback data {:?} from user {}", data, user_id);
                    return Vec::new();
                };
                self.engine
                    .handle(user_id, EngineEvent::Choice(choice))
                    .await
                    .unwrap_or_else(|| {
                        debug!("Stale button press from user {}", user_id);
                        Vec::new()
                    })
            }
        }
    }

    async fn handle_command(&self, user_id: UserId, user_name: &str, name: &str) -> Vec<Reply> {
        if let Some(workflow) = Workflow::from_command(name) {
            return self
                .engine
                .handle(user_id, EngineEvent::Start(workflow))
                .await
                .unwrap_or_default();
        }

        match DirectCommand::from_name(name) {
            Some(DirectCommand::Start) => vec![Reply::text(messages::greeting(user_name))],
            Some(DirectCommand::Help) => vec![Reply::text(messages::help())],
            Some(DirectCommand::Remote(command)) => {
                let result = self.remote.run(&command).await;
                vec![Reply::text(messages::remote_output(&result))]
            }
            Some(DirectCommand::ListRecords(kind)) => {
                let text = match self.persistence.list(kind).await {
                    Some(rows) if !rows.is_empty() => format_rows(&rows),
                    Some(_) => messages::table_empty(kind).to_string(),
                    None => messages::STORE_READ_FAILED.to_string(),
                };
                vec![Reply::text(text)]
            }
            None => {
                debug!("Unknown command /{} from user {}", name, user_id);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("/get_df"),
            Some(("get_df".to_string(), String::new()))
        );
        assert_eq!(
            parse_command("/find_email@sysops_bot  some text "),
            Some(("find_email".to_string(), "some text".to_string()))
        );
        assert_eq!(
            parse_command("/START"),
            Some(("start".to_string(), String::new()))
        );
        assert_eq!(
            parse_command("/Get_DF@SysOps_Bot Extra"),
            Some(("get_df".to_string(), "Extra".to_string()))
        );
        assert_eq!(parse_command("hello /get_df"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_from_text_classifies() {
        let cmd = InboundEvent::from_text(UserId(1), "Ann", "/start");
        assert_eq!(
            cmd.kind,
            Inbound::Command {
                name: "start".into(),
                args: String::new()
            }
        );

        let txt = InboundEvent::from_text(UserId(1), "Ann", "call me 89991234567");
        assert_eq!(txt.kind, Inbound::Text("call me 89991234567".into()));
    }

    #[test]
    fn test_direct_command_lookup() {
        assert_eq!(DirectCommand::from_name("start"), Some(DirectCommand::Start));
        assert_eq!(
            DirectCommand::from_name("get_uptime"),
            Some(DirectCommand::Remote(RemoteCommand::Uptime))
        );
        assert_eq!(
            DirectCommand::from_name("get_emails"),
            Some(DirectCommand::ListRecords(RecordKind::Email))
        );
        assert_eq!(DirectCommand::from_name("find_email"), None);
    }
}
