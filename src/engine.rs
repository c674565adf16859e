//! Conversation Engine
//!
//! Per-user state machine for the multi-turn workflows:
//!
//! ```text
//! phone / email:  awaiting_text -> awaiting_confirmation -> idle
//! password:       awaiting_text -> idle
//! packages:       awaiting_choice -> idle
//!                 awaiting_choice -> awaiting_package_name -> idle
//! ```
//!
//! `transition` is pure: it rewrites the session and returns the effects to
//! run. `ConversationEngine` applies it under the session lock, then performs
//! the effects (store writes, remote commands) outside the lock.

use std::sync::Arc;
use tracing::debug;

use crate::extract::{self, ExtractionResult};
use crate::messages::{self, Reply, AFFIRMATIVE};
use crate::remote::{RemoteCommand, RemoteGateway};
use crate::session::{
    ConversationState, ExtractionStage, PackageStage, ScratchKey, Session, SessionStore, UserId,
    Workflow,
};
use crate::store::PersistenceGateway;

/// Button choice in the package-lookup workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageChoice {
    All,
    Specific,
}

impl PackageChoice {
    /// Encode as callback data
    pub fn encode(&self) -> &'static str {
        match self {
            Self::All => "all_packages",
            Self::Specific => "specific_package",
        }
    }

    /// Decode callback data
    pub fn decode(data: &str) -> Option<Self> {
        match data {
            "all_packages" => Some(Self::All),
            "specific_package" => Some(Self::Specific),
            _ => None,
        }
    }
}

/// Events the engine understands. Commands never arrive as `Text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Start(Workflow),
    Text(String),
    Choice(PackageChoice),
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply(Reply),
    Persist(ExtractionResult),
    Lookup(RemoteCommand),
}

fn reply(text: impl Into<String>) -> Effect {
    Effect::Reply(Reply::text(text))
}

/// Exact (case-insensitive) match on the affirmative token; anything else declines.
pub fn is_affirmative(answer: &str) -> bool {
    answer.to_lowercase() == AFFIRMATIVE
}

/// Advance one session by one event.
///
/// Returns `None` when the current state does not consume the event; the
/// session is left untouched in that case.
pub fn transition(session: &mut Session, event: &EngineEvent) -> Option<Vec<Effect>> {
    use ConversationState as S;

    match (session.state, event) {
        // Entry commands win over whatever is in progress
        (_, EngineEvent::Start(workflow)) => {
            session.begin(*workflow);
            Some(vec![Effect::Reply(messages::entry_prompt(*workflow))])
        }

        (S::Extraction(kind, ExtractionStage::AwaitingText), EngineEvent::Text(text)) => {
            let result = extract::extract(kind, text);
            if result.is_empty() {
                session.finish();
                return Some(vec![reply(messages::not_found(
                    kind,
                    extract::has_long_digit_run(text),
                ))]);
            }

            let prompt = messages::confirm_prompt(&result);
            session.scratch.insert(ScratchKey::pending(kind), result);
            session.state = S::Extraction(kind, ExtractionStage::AwaitingConfirmation);
            Some(vec![reply(prompt)])
        }

        (S::Extraction(kind, ExtractionStage::AwaitingConfirmation), EngineEvent::Text(answer)) => {
            let pending = session
                .scratch
                .remove(&ScratchKey::pending(kind))
                .unwrap_or(ExtractionResult {
                    kind,
                    items: Vec::new(),
                });
            session.finish();

            if is_affirmative(answer) {
                Some(vec![Effect::Persist(pending)])
            } else {
                Some(vec![reply(messages::save_cancelled(kind))])
            }
        }

        (S::PasswordAwaitingText, EngineEvent::Text(password)) => {
            session.finish();
            Some(vec![reply(messages::password_verdict(
                extract::is_strong_password(password),
            ))])
        }

        (S::Package(PackageStage::AwaitingChoice), EngineEvent::Choice(PackageChoice::All)) => {
            session.finish();
            Some(vec![Effect::Lookup(RemoteCommand::InstalledPackages)])
        }

        (S::Package(PackageStage::AwaitingChoice), EngineEvent::Choice(PackageChoice::Specific)) => {
            session.state = S::Package(PackageStage::AwaitingPackageName);
            Some(vec![reply(messages::ASK_PACKAGE_NAME)])
        }

        (S::Package(PackageStage::AwaitingPackageName), EngineEvent::Text(name)) => {
            session.finish();
            Some(vec![Effect::Lookup(RemoteCommand::PackageInfo(name.clone()))])
        }

        _ => None,
    }
}

/// Drives sessions and performs the effects their transitions request
#[derive(Clone)]
pub struct ConversationEngine {
    sessions: Arc<SessionStore>,
    persistence: PersistenceGateway,
    remote: RemoteGateway,
}

impl ConversationEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        persistence: PersistenceGateway,
        remote: RemoteGateway,
    ) -> Self {
        Self {
            sessions,
            persistence,
            remote,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Feed one event to a user's session. `None` if the event was not consumed.
    pub async fn handle(&self, user_id: UserId, event: EngineEvent) -> Option<Vec<Reply>> {
        let effects = self
            .sessions
            .update(user_id, |session| {
                let from = session.state;
                let effects = transition(session, &event);
                if effects.is_some() {
                    debug!("Session {}: {:?} -> {:?}", user_id, from, session.state);
                }
                effects
            })
            .await?;

        let mut replies = Vec::with_capacity(effects.len());
        for effect in effects {
            replies.push(self.perform(effect).await);
        }
        Some(replies)
    }

    async fn perform(&self, effect: Effect) -> Reply {
        match effect {
            Effect::Reply(reply) => reply,
            Effect::Persist(result) => {
                let ok = self.persistence.save(result.kind, &result.items).await;
                Reply::text(if ok {
                    messages::saved(result.kind)
                } else {
                    messages::save_failed(result.kind)
                })
            }
            Effect::Lookup(command) => {
                let result = self.remote.run(&command).await;
                Reply::text(messages::package_lookup_output(&command, &result))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordKind;

    fn session_in(state: ConversationState) -> Session {
        let mut s = Session::new(UserId(7));
        s.state = state;
        s
    }

    fn text(t: &str) -> EngineEvent {
        EngineEvent::Text(t.to_string())
    }

    #[test]
    fn test_choice_roundtrip() {
        for c in [PackageChoice::All, PackageChoice::Specific] {
            assert_eq!(PackageChoice::decode(c.encode()), Some(c));
        }
        assert_eq!(PackageChoice::decode("logs:1"), None);
    }

    #[test]
    fn test_affirmative_matching() {
        assert!(is_affirmative("да"));
        assert!(is_affirmative("ДА"));
        assert!(is_affirmative("Да"));
        assert!(!is_affirmative("Да "));
        assert!(!is_affirmative("нет"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yes"));
    }

    #[test]
    fn test_phone_found_asks_confirmation() {
        let mut s = Session::new(UserId(7));
        transition(&mut s, &EngineEvent::Start(Workflow::FindPhoneNumbers));

        let effects = transition(&mut s, &text("+7 999 123 45 67")).unwrap();
        assert_eq!(
            s.state,
            ConversationState::Extraction(RecordKind::Phone, ExtractionStage::AwaitingConfirmation)
        );
        assert_eq!(s.scratch[&ScratchKey::PendingPhoneNumbers].items, vec!["89991234567"]);
        match &effects[0] {
            Effect::Reply(r) => assert!(r.text.contains("1. 89991234567")),
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_empty_extraction_goes_idle() {
        let mut s = Session::new(UserId(7));
        transition(&mut s, &EngineEvent::Start(Workflow::FindEmails));

        let effects = transition(&mut s, &text("nothing to see")).unwrap();
        assert!(s.is_idle());
        assert_eq!(effects, vec![reply("Email-адреса не найдены")]);
    }

    #[test]
    fn test_confirmation_yes_persists() {
        let mut s = Session::new(UserId(7));
        transition(&mut s, &EngineEvent::Start(Workflow::FindEmails));
        transition(&mut s, &text("a@b.cd a@b.cd"));

        let effects = transition(&mut s, &text("ДА")).unwrap();
        assert!(s.is_idle());
        assert_eq!(
            effects,
            vec![Effect::Persist(ExtractionResult {
                kind: RecordKind::Email,
                items: vec!["a@b.cd".into(), "a@b.cd".into()],
            })]
        );
    }

    #[test]
    fn test_confirmation_other_input_cancels() {
        for answer in ["нет", "Да ", "", "maybe"] {
            let mut s = Session::new(UserId(7));
            transition(&mut s, &EngineEvent::Start(Workflow::FindPhoneNumbers));
            transition(&mut s, &text("89991234567"));

            let effects = transition(&mut s, &text(answer)).unwrap();
            assert!(s.is_idle());
            assert_eq!(effects, vec![reply("Сохранение номеров телефонов отменено")]);
        }
    }

    #[test]
    fn test_password_single_turn() {
        let mut s = session_in(ConversationState::PasswordAwaitingText);
        let effects = transition(&mut s, &text("Abcdef1!")).unwrap();
        assert!(s.is_idle());
        assert_eq!(effects, vec![reply("Пароль сложный")]);
    }

    #[test]
    fn test_package_branches() {
        let mut s = session_in(ConversationState::Package(PackageStage::AwaitingChoice));
        let effects = transition(&mut s, &EngineEvent::Choice(PackageChoice::All)).unwrap();
        assert!(s.is_idle());
        assert_eq!(effects, vec![Effect::Lookup(RemoteCommand::InstalledPackages)]);

        let mut s = session_in(ConversationState::Package(PackageStage::AwaitingChoice));
        transition(&mut s, &EngineEvent::Choice(PackageChoice::Specific)).unwrap();
        assert_eq!(s.state, ConversationState::Package(PackageStage::AwaitingPackageName));

        let effects = transition(&mut s, &text("curl")).unwrap();
        assert!(s.is_idle());
        assert_eq!(
            effects,
            vec![Effect::Lookup(RemoteCommand::PackageInfo("curl".into()))]
        );
    }

    #[test]
    fn test_unconsumed_events_leave_state() {
        let mut idle = Session::new(UserId(7));
        assert!(transition(&mut idle, &text("hello")).is_none());
        assert!(transition(&mut idle, &EngineEvent::Choice(PackageChoice::All)).is_none());

        let choosing = ConversationState::Package(PackageStage::AwaitingChoice);
        let mut s = session_in(choosing);
        assert!(transition(&mut s, &text("curl")).is_none());
        assert_eq!(s.state, choosing);

        let mut s = session_in(ConversationState::PasswordAwaitingText);
        assert!(transition(&mut s, &EngineEvent::Choice(PackageChoice::Specific)).is_none());
        assert_eq!(s.state, ConversationState::PasswordAwaitingText);
    }

    #[test]
    fn test_restart_mid_workflow_discards_scratch() {
        let mut s = Session::new(UserId(7));
        transition(&mut s, &EngineEvent::Start(Workflow::FindPhoneNumbers));
        transition(&mut s, &text("89991234567"));
        assert!(!s.scratch.is_empty());

        transition(&mut s, &EngineEvent::Start(Workflow::FindEmails));
        assert!(s.scratch.is_empty());
        assert_eq!(
            s.state,
            ConversationState::Extraction(RecordKind::Email, ExtractionStage::AwaitingText)
        );
    }
}
