//! The match loop: one task per online match.
//!
//! The task owns the negotiator, the controller and the rendezvous connection,
//! and multiplexes three sources with `tokio::select!`:
//! - the poll timer (only while negotiating)
//! - events from the peer transport
//! - commands from the UI
//!
//! Every exit path tears the negotiator down, which stops polling and releases
//! the transport.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::rendezvous::RendezvousClient;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use xover_core::{
    CloseReason, ConnectionStatus, GameController, GameState, Mark, MoveRecord,
    NegotiationState, NegotiatorAction, Notice, PeerTransport, Role, SessionCode,
    SessionNegotiator, TransportEvent,
};
use xover_server::{Clock, SystemClock};

/// Requests from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCommand {
    /// Play at this position
    Move { sub_index: usize, cell_index: usize },
    /// End the match
    Leave,
}

/// What the UI should redraw
#[derive(Debug, Clone, PartialEq)]
pub enum MatchUpdate {
    Status(ConnectionStatus),
    /// A move was applied, locally or from the peer
    Moved { record: MoveRecord, state: GameState },
    /// The notice changed; `None` clears it
    Notice(Option<Notice>),
}

/// The UI's end of a running match.
pub struct MatchHandle {
    code: SessionCode,
    local_mark: Mark,
    commands: mpsc::UnboundedSender<MatchCommand>,
    updates: mpsc::UnboundedReceiver<MatchUpdate>,
    task: JoinHandle<()>,
}

impl MatchHandle {
    /// Code to share with the other player
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn local_mark(&self) -> Mark {
        self.local_mark
    }

    pub fn play(&self, sub_index: usize, cell_index: usize) -> Result<()> {
        self.commands
            .send(MatchCommand::Move {
                sub_index,
                cell_index,
            })
            .map_err(|_| ClientError::Disconnected)
    }

    /// Wait for the next update; `None` once the match has ended.
    pub async fn next_update(&mut self) -> Option<MatchUpdate> {
        self.updates.recv().await
    }

    /// Ask the match to end without waiting; the final updates still arrive
    /// through [`MatchHandle::next_update`].
    pub fn request_leave(&self) -> Result<()> {
        self.commands
            .send(MatchCommand::Leave)
            .map_err(|_| ClientError::Disconnected)
    }

    /// End the match and wait for the transport to be released.
    pub async fn leave(self) {
        let _ = self.commands.send(MatchCommand::Leave);
        if let Err(e) = self.task.await {
            warn!("Match task ended abnormally: {}", e);
        }
    }
}

/// Create a session and start negotiating as host.
pub async fn host_match<T>(
    config: &ClientConfig,
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
) -> Result<MatchHandle>
where
    T: PeerTransport + Send + 'static,
{
    config.validate()?;
    let code = SessionCode::generate(&mut rand::thread_rng());
    let mut rendezvous = RendezvousClient::connect(&config.server_url).await?;
    rendezvous.create(&code).await?;
    info!(code = %code, "Hosting match");

    start_match(config, rendezvous, code, Role::Host, transport, events).await
}

/// Join the session a host shared with us.
pub async fn join_match<T>(
    config: &ClientConfig,
    code: &str,
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
) -> Result<MatchHandle>
where
    T: PeerTransport + Send + 'static,
{
    config.validate()?;
    let code = SessionCode::parse(code)?;
    let mut rendezvous = RendezvousClient::connect(&config.server_url).await?;
    if rendezvous.fetch(&code).await?.is_none() {
        rendezvous.close().await;
        return Err(ClientError::SessionNotFound(code));
    }
    info!(code = %code, "Joining match");

    start_match(config, rendezvous, code, Role::Joiner, transport, events).await
}

async fn start_match<T>(
    config: &ClientConfig,
    rendezvous: RendezvousClient,
    code: SessionCode,
    role: Role,
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
) -> Result<MatchHandle>
where
    T: PeerTransport + Send + 'static,
{
    let local_mark = code.mark_for(role);
    let mut negotiator = SessionNegotiator::new(code.clone(), role, transport)
        .with_timeout(config.negotiation_timeout);
    let actions = negotiator.start(now_millis())?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    let mut session = MatchLoop {
        poll_interval: config.poll_interval,
        rendezvous,
        negotiator,
        controller: GameController::online(local_mark)
            .with_notice_duration(config.notice_duration),
        updates: update_tx,
    };
    session.perform(actions).await;

    let task = tokio::spawn(session.run(events, command_rx));

    Ok(MatchHandle {
        code,
        local_mark,
        commands: command_tx,
        updates: update_rx,
        task,
    })
}

struct MatchLoop<T: PeerTransport> {
    poll_interval: Duration,
    rendezvous: RendezvousClient,
    negotiator: SessionNegotiator<T>,
    controller: GameController,
    updates: mpsc::UnboundedSender<MatchUpdate>,
}

impl<T: PeerTransport> MatchLoop<T> {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut commands: mpsc::UnboundedReceiver<MatchCommand>,
    ) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let notice_wait = self
                .controller
                .notice_expires_at()
                .map(|at| Duration::from_millis(at.saturating_sub(now_millis())));

            tokio::select! {
                _ = ticker.tick(), if self.negotiator.is_polling() => {
                    self.poll().await;
                }

                Some(event) = events.recv() => {
                    let actions = self.negotiator.on_transport_event(event, now_millis());
                    self.perform(actions).await;
                }

                command = commands.recv() => match command {
                    Some(MatchCommand::Move { sub_index, cell_index }) => {
                        self.play(sub_index, cell_index);
                    }
                    Some(MatchCommand::Leave) | None => break,
                },

                _ = tokio::time::sleep(notice_wait.unwrap_or_default()),
                    if notice_wait.is_some() =>
                {
                    let notice = self.controller.notice(now_millis()).cloned();
                    self.emit(MatchUpdate::Notice(notice));
                }
            }
        }

        self.shutdown().await;
    }

    async fn poll(&mut self) {
        let now = now_millis();
        let actions = self.negotiator.check_timeout(now);
        self.perform(actions).await;
        if !self.negotiator.is_polling() {
            return;
        }

        let code = self.negotiator.code().clone();
        match self.rendezvous.fetch(&code).await {
            Ok(Some(record)) => {
                let actions = self.negotiator.on_record(&record, now);
                self.perform(actions).await;
            }
            Ok(None) => debug!(code = %code, "Session record missing"),
            Err(e) => warn!(code = %code, "Poll failed: {}", e),
        }
    }

    async fn perform(&mut self, actions: Vec<NegotiatorAction>) {
        for action in actions {
            match action {
                NegotiatorAction::Publish(message) => {
                    let code = self.negotiator.code().clone();
                    let role = self.negotiator.role();
                    match self.rendezvous.publish(&code, message, role).await {
                        Ok(true) => {}
                        Ok(false) => debug!(code = %code, "Record gone, signal dropped"),
                        Err(e) => warn!(code = %code, "Publish failed: {}", e),
                    }
                }
                NegotiatorAction::StatusChanged(status) => {
                    let now = now_millis();
                    match self.negotiator.state() {
                        NegotiationState::Closed(CloseReason::Teardown) => self.controller.leave(),
                        _ => self.controller.set_connection(status, now),
                    }
                    self.emit(MatchUpdate::Status(status));
                    let notice = self.controller.notice(now).cloned();
                    self.emit(MatchUpdate::Notice(notice));
                }
                NegotiatorAction::Deliver(text) => {
                    if let Some(record) = self.controller.on_remote_message(&text) {
                        self.emit_move(record);
                    }
                }
            }
        }
    }

    fn play(&mut self, sub_index: usize, cell_index: usize) {
        let now = now_millis();
        match self.controller.attempt_local_move(sub_index, cell_index, now) {
            Ok(message) => {
                if let Some(message) = message {
                    let sent = message
                        .encode()
                        .map_err(ClientError::from)
                        .and_then(|text| self.negotiator.send(&text).map_err(ClientError::from));
                    if let Err(e) = sent {
                        warn!("Move not delivered: {}", e);
                    }
                }
                if let Some(record) = self.controller.state().history.last().copied() {
                    self.emit_move(record);
                }
            }
            Err(rejection) => {
                debug!(sub_index, cell_index, "Move refused: {}", rejection);
                let notice = self.controller.notice(now).cloned();
                self.emit(MatchUpdate::Notice(notice));
            }
        }
    }

    fn emit_move(&self, record: MoveRecord) {
        self.emit(MatchUpdate::Moved {
            record,
            state: self.controller.state().clone(),
        });
    }

    fn emit(&self, update: MatchUpdate) {
        // The UI may have stopped listening; the match still ends cleanly
        let _ = self.updates.send(update);
    }

    async fn shutdown(mut self) {
        let actions = self.negotiator.teardown();
        self.perform(actions).await;
        info!(code = %self.negotiator.code(), "Match ended");

        let MatchLoop { rendezvous, .. } = self;
        rendezvous.close().await;
    }
}

fn now_millis() -> u64 {
    SystemClock.now_millis()
}
