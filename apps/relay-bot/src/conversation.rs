//! Per-requester conversation flow.
//!
//! Updates are routed to one actor per requester, so a requester's inputs
//! are handled strictly in order while different requesters never wait on
//! each other. `/cancel` is applied by the dispatcher before it is queued,
//! so it takes effect even while the actor is busy validating a link.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use linkrelay_pipeline::report::{self, escape_html};
use linkrelay_pipeline::{NameChoice, PipelineError, RequesterId, TransferCoordinator};
use linkrelay_relay::{ChatId, MessageRef};
use linkrelay_telegram::{InlineKeyboardMarkup, Update};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::BotApi;

/// Callback data of the "use default name" button.
const CHOICE_DEFAULT: &str = "default";
/// Callback data of the "rename" button.
const CHOICE_RENAME: &str = "rename";

/// Queued inputs per requester before new ones are dropped.
const QUEUE_DEPTH: usize = 32;

/// An idle actor with nothing pending exits after this long.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub const WELCOME: &str = "🤖 <b>Welcome to File Download Bot!</b>\n\n\
    I can download files from direct links and send them to you.\n\
    I support files larger than 4GB!\n\n\
    <b>Commands:</b>\n\
    /download - Start downloading a file\n\
    /cancel - Cancel current operation\n\
    /help - Show this message\n\n\
    Send me a direct download link to get started!";

pub const DOWNLOAD_PROMPT: &str = "📎 Please send me a direct download link.\n\n\
    Example: https://example.com/file.zip";

const BUSY: &str = "⏳ A transfer is already running. Send /cancel to stop it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Download,
    Cancel,
}

/// One thing a requester did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Text(String),
    Button {
        query_id: String,
        data: String,
        message: Option<MessageRef>,
    },
    /// `/cancel` after the dispatcher applied it; `stopped_transfer` tells
    /// whether a running transfer was signalled.
    Cancelled { stopped_transfer: bool },
}

/// Who sent an input, and where to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub requester: RequesterId,
    pub chat: ChatId,
}

/// Extracts the input carried by an update, if any.
pub fn parse_update(update: &Update) -> Option<(Origin, Input)> {
    if let Some(query) = &update.callback_query {
        let message = query.message.as_ref().map(|m| MessageRef {
            chat: ChatId(m.chat.id),
            message_id: m.message_id,
        });
        let origin = Origin {
            requester: RequesterId(query.from.id),
            chat: message.map_or(ChatId(query.from.id), |m| m.chat),
        };
        return Some((
            origin,
            Input::Button {
                query_id: query.id.clone(),
                data: query.data.clone().unwrap_or_default(),
                message,
            },
        ));
    }

    let message = update.message.as_ref()?;
    let text = message.text.as_deref()?.trim();
    let from = message.from.as_ref()?;
    if from.is_bot || text.is_empty() {
        return None;
    }
    let origin = Origin {
        requester: RequesterId(from.id),
        chat: ChatId(message.chat.id),
    };

    let input = match text.strip_prefix('/') {
        Some(command) => {
            let name = command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            let command = match name {
                "start" => Command::Start,
                "help" => Command::Help,
                "download" => Command::Download,
                "cancel" => Command::Cancel,
                other => {
                    debug!(command = other, "unknown command ignored");
                    return None;
                }
            };
            Input::Command(command)
        }
        None => Input::Text(text.to_string()),
    };
    Some((origin, input))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingLink,
    /// Link accepted, name buttons shown.
    AwaitingChoice,
    AwaitingRename,
    Transferring,
}

/// Conversation state of one requester.
pub struct Conversation {
    origin: Origin,
    phase: Phase,
    api: Arc<dyn BotApi>,
    coordinator: Arc<TransferCoordinator>,
    transfer: Option<JoinHandle<()>>,
}

impl Conversation {
    pub fn new(
        origin: Origin,
        api: Arc<dyn BotApi>,
        coordinator: Arc<TransferCoordinator>,
    ) -> Self {
        Self {
            origin,
            phase: Phase::Idle,
            api,
            coordinator,
            transfer: None,
        }
    }

    /// Whether the actor may exit without losing anything.
    fn is_dormant(&mut self) -> bool {
        self.reap_transfer();
        self.phase == Phase::Idle && self.transfer.is_none()
    }

    fn reap_transfer(&mut self) {
        if self.transfer.as_ref().is_some_and(|h| h.is_finished()) {
            self.transfer = None;
            if self.phase == Phase::Transferring {
                self.phase = Phase::Idle;
            }
        }
    }

    pub async fn handle(&mut self, input: Input) {
        self.reap_transfer();
        match input {
            Input::Command(Command::Start | Command::Help) => self.say(WELCOME).await,
            Input::Command(Command::Download) => {
                if self.phase == Phase::Transferring {
                    self.say(BUSY).await;
                } else {
                    self.phase = Phase::AwaitingLink;
                    self.say(DOWNLOAD_PROMPT).await;
                }
            }
            Input::Command(Command::Cancel) => {
                let stopped_transfer = apply_cancel(&self.coordinator, self.origin.requester);
                self.on_cancelled(stopped_transfer).await;
            }
            Input::Cancelled { stopped_transfer } => self.on_cancelled(stopped_transfer).await,
            Input::Text(text) => match self.phase {
                Phase::Transferring => self.say(BUSY).await,
                Phase::AwaitingRename => self.rename(&text).await,
                // A new link while the buttons are showing replaces the session.
                Phase::Idle | Phase::AwaitingLink | Phase::AwaitingChoice => {
                    self.submit_link(&text).await
                }
            },
            Input::Button {
                query_id,
                data,
                message,
            } => {
                if let Err(e) = self.api.answer_callback(&query_id).await {
                    debug!(error = %e, "callback not acknowledged");
                }
                self.press(&data, message).await;
            }
        }
    }

    async fn on_cancelled(&mut self, stopped_transfer: bool) {
        // Inputs queued ahead of the cancel may have stored a session or
        // started a transfer since the dispatcher applied it.
        let stopped_transfer =
            stopped_transfer || apply_cancel(&self.coordinator, self.origin.requester);
        if stopped_transfer {
            // The transfer's own status message reports the cancellation.
            return;
        }
        self.phase = Phase::Idle;
        self.say(&report::cancelled()).await;
    }

    async fn submit_link(&mut self, raw: &str) {
        let status = match self.api.send_message(self.origin.chat, &report::validating()).await {
            Ok(message) => message,
            Err(e) => {
                warn!(requester = %self.origin.requester, error = %e, "could not reply");
                return;
            }
        };

        match self.coordinator.submit_link(self.origin.requester, raw).await {
            Ok(session) => {
                let keyboard = name_keyboard();
                let text = report::link_accepted(&session);
                if let Err(e) = self.api.edit_with_keyboard(status, &text, &keyboard).await {
                    debug!(error = %e, "summary edit failed, sending instead");
                    if let Err(e) = self
                        .api
                        .send_with_keyboard(self.origin.chat, &text, &keyboard)
                        .await
                    {
                        warn!(error = %e, "could not show link summary");
                    }
                }
                self.phase = Phase::AwaitingChoice;
            }
            Err(PipelineError::Link(reason)) => {
                self.edit(status, &report::link_rejected(&reason)).await;
                self.phase = Phase::AwaitingLink;
            }
            Err(PipelineError::TransferInProgress) => self.edit(status, BUSY).await,
            Err(other) => {
                warn!(requester = %self.origin.requester, error = %other, "link submission failed");
                let text = format!("❌ Error: {}", escape_html(&other.to_string()));
                self.edit(status, &text).await;
                self.phase = Phase::AwaitingLink;
            }
        }
    }

    async fn press(&mut self, data: &str, message: Option<MessageRef>) {
        let requester = self.origin.requester;
        let Some(session) = self.coordinator.sessions().get(requester) else {
            self.reply_or_edit(message, &report::session_expired()).await;
            self.phase = Phase::Idle;
            return;
        };

        match data {
            CHOICE_DEFAULT => match self.coordinator.choose_name(requester, NameChoice::Suggested) {
                Ok(_) => self.start_transfer(message).await,
                Err(e) => self.name_rejected(message, e).await,
            },
            CHOICE_RENAME => {
                self.reply_or_edit(message, &report::rename_prompt(&session)).await;
                self.phase = Phase::AwaitingRename;
            }
            other => debug!(data = other, "unknown button ignored"),
        }
    }

    async fn rename(&mut self, raw: &str) {
        let choice = NameChoice::Override(raw.to_string());
        match self.coordinator.choose_name(self.origin.requester, choice) {
            Ok(_) => self.start_transfer(None).await,
            Err(e) => self.name_rejected(None, e).await,
        }
    }

    async fn name_rejected(&mut self, message: Option<MessageRef>, error: PipelineError) {
        match error {
            PipelineError::InvalidName(reason) => {
                debug!(requester = %self.origin.requester, reason = %reason, "name rejected");
                self.say(&report::invalid_name()).await;
            }
            PipelineError::NameAlreadyChosen => self.say(BUSY).await,
            _ => {
                self.reply_or_edit(message, &report::session_expired()).await;
                self.phase = Phase::Idle;
            }
        }
    }

    /// Runs the transfer in its own task so the conversation stays responsive.
    async fn start_transfer(&mut self, status: Option<MessageRef>) {
        let Origin { requester, chat } = self.origin;
        let coordinator = Arc::clone(&self.coordinator);
        let api = Arc::clone(&self.api);

        self.phase = Phase::Transferring;
        self.transfer = Some(tokio::spawn(async move {
            match coordinator.run_transfer(requester, chat, status).await {
                Ok(outcome) => {
                    info!(requester = %requester, state = %outcome.state, "transfer finished");
                }
                Err(e) => {
                    warn!(requester = %requester, error = %e, "transfer not started");
                    if let Err(e) = api.send_message(chat, &report::session_expired()).await {
                        debug!(error = %e, "could not reply");
                    }
                }
            }
        }));
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.api.send_message(self.origin.chat, text).await {
            warn!(requester = %self.origin.requester, error = %e, "could not reply");
        }
    }

    async fn edit(&self, message: MessageRef, text: &str) {
        if let Err(e) = self.api.edit_message(message, text).await {
            debug!(error = %e, "edit skipped");
        }
    }

    async fn reply_or_edit(&self, message: Option<MessageRef>, text: &str) {
        match message {
            Some(message) => self.edit(message, text).await,
            None => self.say(text).await,
        }
    }

    /// Waits for a running transfer to finish, if any.
    async fn join_transfer(&mut self) {
        if let Some(handle) = self.transfer.take() {
            let _ = handle.await;
        }
    }
}

/// Cancels whatever the requester has going; true if a transfer was running.
fn apply_cancel(coordinator: &TransferCoordinator, requester: RequesterId) -> bool {
    let running = coordinator.is_transferring(requester);
    coordinator.cancel(requester);
    running
}

fn name_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(&[
        ("📄 Use Default Name", CHOICE_DEFAULT),
        ("✏️ Rename File", CHOICE_RENAME),
    ])
}

/// Routes inputs to per-requester actors.
pub struct Dispatcher {
    api: Arc<dyn BotApi>,
    coordinator: Arc<TransferCoordinator>,
    routes: HashMap<RequesterId, mpsc::Sender<Input>>,
    actors: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn BotApi>, coordinator: Arc<TransferCoordinator>) -> Self {
        Self {
            api,
            coordinator,
            routes: HashMap::new(),
            actors: Vec::new(),
        }
    }

    pub fn dispatch(&mut self, update: &Update) {
        let Some((origin, input)) = parse_update(update) else {
            return;
        };

        let input = match input {
            Input::Command(Command::Cancel) => Input::Cancelled {
                stopped_transfer: apply_cancel(&self.coordinator, origin.requester),
            },
            other => other,
        };
        self.route(origin, input);
    }

    fn route(&mut self, origin: Origin, input: Input) {
        let sender = match self.routes.get(&origin.requester) {
            Some(tx) if !tx.is_closed() => tx.clone(),
            _ => self.spawn_actor(origin),
        };
        if let Err(e) = sender.try_send(input) {
            warn!(requester = %origin.requester, error = %e, "input dropped");
        }
    }

    fn spawn_actor(&mut self, origin: Origin) -> mpsc::Sender<Input> {
        let (tx, mut rx) = mpsc::channel(QUEUE_DEPTH);
        let mut conversation =
            Conversation::new(origin, Arc::clone(&self.api), Arc::clone(&self.coordinator));

        self.actors.retain(|h| !h.is_finished());
        self.actors.push(tokio::spawn(async move {
            debug!(requester = %origin.requester, "conversation started");
            loop {
                match tokio::time::timeout(IDLE_TIMEOUT, rx.recv()).await {
                    Ok(Some(input)) => conversation.handle(input).await,
                    Ok(None) => break,
                    Err(_) => {
                        if conversation.is_dormant() {
                            break;
                        }
                    }
                }
            }
            conversation.join_transfer().await;
            debug!(requester = %origin.requester, "conversation ended");
        }));

        self.routes.insert(origin.requester, tx.clone());
        tx
    }

    /// Closes every queue and waits for the actors and their transfers.
    pub async fn shutdown(mut self) {
        self.routes.clear();
        for actor in self.actors.drain(..) {
            let _ = actor.await;
        }
    }
}
