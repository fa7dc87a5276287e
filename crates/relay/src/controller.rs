//! Routing of inbound events by sender role.
//!
//! ```text
//! InboundEvent ──► classify ──► Unroutable ─────────────► dropped
//!                     │
//!                     ├──► Command ──► role ──► start / exit / count
//!                     │                          (registry mutation → notify_all)
//!                     └──► Payload ──► instructor? ──► Broadcaster(snapshot)
//!                                          └─ student ──► dropped
//! ```

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use {
    tokio::runtime::Handle,
    tracing::{debug, info, warn},
};

use {
    lectern_channels::{
        ChannelOutbound, Classification, Command, InboundEvent, Sender, SubscriberId, classify,
    },
    lectern_sessions::{
        Clock, DEFAULT_SESSION_TTL, SessionEvent, SessionListener, SessionRegistry,
        SubscribeOutcome, UnsubscribeOutcome,
    },
};

use crate::{
    Result,
    broadcaster::{BroadcastHandle, Broadcaster},
    notices,
    notifier::ObserverNotifier,
};

/// Static relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Username of the only sender allowed to broadcast, with or without `@`.
    pub instructor: String,
    pub session_ttl: Duration,
    pub max_in_flight: Option<NonZeroUsize>,
    /// This bot's own username. Commands mentioning another bot are dropped.
    pub bot_username: Option<String>,
}

impl RelayConfig {
    pub fn new(instructor: impl Into<String>) -> Self {
        Self {
            instructor: instructor.into(),
            session_ttl: DEFAULT_SESSION_TTL,
            max_in_flight: None,
            bot_username: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Instructor,
    Student,
}

/// What the controller did with an event.
#[derive(Debug)]
pub enum Handled {
    /// Instructor asked for usage instructions.
    Instructions,
    Subscribed(SubscribeOutcome),
    Unsubscribed(UnsubscribeOutcome),
    Count(usize),
    /// Instructor payload handed to the broadcaster. Dropping the handle
    /// leaves the deliveries running.
    Broadcast(BroadcastHandle),
    /// Command not available to the sender's role. No state was changed.
    Rejected(Command),
    /// Unknown command, unsupported content, or a student's plain message.
    Ignored,
}

/// Reacts to registry mutations: pushes the new count to observers and tells
/// expired subscribers their session is over.
pub struct SessionHooks {
    outbound: Arc<dyn ChannelOutbound>,
    notifier: Arc<dyn ObserverNotifier>,
    runtime: Handle,
}

impl SessionHooks {
    pub fn new(
        outbound: Arc<dyn ChannelOutbound>,
        notifier: Arc<dyn ObserverNotifier>,
        runtime: Handle,
    ) -> Self {
        Self {
            outbound,
            notifier,
            runtime,
        }
    }
}

impl SessionListener for SessionHooks {
    fn on_session_event(&self, event: &SessionEvent, count: usize) {
        self.notifier.notify_all(count);

        if let SessionEvent::Expired(id) = event {
            let outbound = Arc::clone(&self.outbound);
            let id = id.clone();
            self.runtime.spawn(async move {
                if let Err(e) = outbound.send_text(&id, notices::SESSION_EXPIRED).await {
                    warn!(chat_id = %id, error = %e, "failed to send expiry notice");
                }
            });
        }
    }
}

pub struct SessionController {
    instructor: String,
    bot_username: Option<String>,
    registry: SessionRegistry,
    broadcaster: Broadcaster,
    outbound: Arc<dyn ChannelOutbound>,
}

impl SessionController {
    /// Build a controller with its own registry wired to [`SessionHooks`].
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: RelayConfig,
        clock: Arc<dyn Clock>,
        outbound: Arc<dyn ChannelOutbound>,
        notifier: Arc<dyn ObserverNotifier>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(lectern_sessions::Error::from)?;
        let hooks = SessionHooks::new(Arc::clone(&outbound), Arc::clone(&notifier), runtime);
        let registry = SessionRegistry::with_listener(clock, config.session_ttl, Arc::new(hooks));
        Ok(Self::with_registry(config, registry, outbound))
    }

    /// Build a controller around an existing registry. Observer pushes are
    /// whatever the registry's listener does.
    pub fn with_registry(
        config: RelayConfig,
        registry: SessionRegistry,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Self {
        let broadcaster =
            Broadcaster::new(Arc::clone(&outbound)).with_max_in_flight(config.max_in_flight);
        Self {
            instructor: normalize_username(&config.instructor),
            bot_username: config.bot_username,
            registry,
            broadcaster,
            outbound,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn role_of(&self, sender: &Sender) -> Role {
        let is_instructor = sender
            .username
            .as_deref()
            .is_some_and(|name| normalize_username(name) == self.instructor);
        if is_instructor {
            Role::Instructor
        } else {
            Role::Student
        }
    }

    /// Handle one inbound event. Errors only come from replying to the
    /// sender; broadcast deliveries never fail the call.
    pub async fn handle(&self, event: &InboundEvent) -> Result<Handled> {
        let chat = &event.sender.chat;
        let role = self.role_of(&event.sender);

        match (classify(&event.body, self.bot_username.as_deref()), role) {
            (Classification::Unroutable, _) => {
                debug!(chat_id = %chat, "dropping unroutable event");
                Ok(Handled::Ignored)
            },

            (Classification::Command(Command::Start), Role::Instructor) => {
                self.reply(chat, notices::INSTRUCTOR_WELCOME).await?;
                Ok(Handled::Instructions)
            },
            (Classification::Command(Command::Start), Role::Student) => {
                let outcome = self.registry.subscribe(chat.clone());
                self.reply(chat, &notices::student_welcome(self.registry.ttl()))
                    .await?;
                Ok(Handled::Subscribed(outcome))
            },

            (Classification::Command(Command::Exit), Role::Instructor) => {
                self.reply(chat, notices::STUDENTS_ONLY).await?;
                Ok(Handled::Rejected(Command::Exit))
            },
            (Classification::Command(Command::Exit), Role::Student) => {
                let outcome = self.registry.unsubscribe(chat);
                let text = match outcome {
                    UnsubscribeOutcome::Removed => notices::LEFT_SESSION,
                    UnsubscribeOutcome::NotFound => notices::NOT_IN_SESSION,
                };
                self.reply(chat, text).await?;
                Ok(Handled::Unsubscribed(outcome))
            },

            (Classification::Command(Command::Count), Role::Instructor) => {
                let count = self.registry.count();
                self.reply(chat, &notices::subscriber_count(count)).await?;
                Ok(Handled::Count(count))
            },
            (Classification::Command(Command::Count), Role::Student) => {
                self.reply(chat, notices::INSTRUCTOR_ONLY).await?;
                Ok(Handled::Rejected(Command::Count))
            },

            (Classification::Payload(payload), Role::Instructor) => {
                let recipients = self.registry.snapshot();
                let handle = self.broadcaster.broadcast(&payload, recipients);
                info!(
                    kind = payload.kind(),
                    attempted = handle.attempted(),
                    "broadcast started"
                );
                self.reply(chat, &notices::broadcast_sent(handle.attempted()))
                    .await?;
                Ok(Handled::Broadcast(handle))
            },
            (Classification::Payload(_), Role::Student) => {
                debug!(chat_id = %chat, "ignoring plain message from student");
                Ok(Handled::Ignored)
            },
        }
    }

    async fn reply(&self, chat: &SubscriberId, text: &str) -> Result<()> {
        self.outbound.send_text(chat, text).await?;
        Ok(())
    }
}

fn normalize_username(name: &str) -> String {
    name.trim().trim_start_matches('@').to_lowercase()
}
