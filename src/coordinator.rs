//! Session coordinator: the single place where peer sessions are created,
//! negotiated and torn down.
//!
//! Everything the coordinator reacts to (relay envelopes, connection callbacks,
//! completed negotiation steps) arrives as an [Event] on one queue and is
//! handled one at a time, so the [PeerRegistry] has exactly one writer and
//! needs no locking.
//!
//! Negotiation with each peer runs in its own task, which executes the
//! offer/answer/candidate steps in the order they were routed to it. A
//! finished step is posted back as an event tagged with the peer id and the
//! session [Epoch]; by the time it is handled the session may be gone (or
//! replaced), in which case the result is dropped.
//!
//! Who offers is decided by who joined last: a participant receiving a
//! broadcast announce answers the newcomer, the newcomer offers to everyone
//! who replies to it.

use crate::envelope::{Destination, Envelope, Payload};
use crate::error::Error;
use crate::identity::{Participant, ParticipantId};
use crate::media::LocalMedia;
use crate::peer_connection::{Connection, Connectivity, Connector, PeerHooks};
use crate::presentation::Presenter;
use crate::registry::{PeerRegistry, PeerSession, Role, SessionState};
use crate::relay::RelaySender;
use futures_util::{Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Generation of a peer session. A peer id can come back after its session was
/// torn down; the epoch tells the two sessions apart.
pub type Epoch = u64;

pub enum Event<T> {
    /// Envelope delivered by the relay.
    Signal(Envelope),
    /// The relay is gone, with the reason if there was one.
    RelayClosed(Option<Error>),
    LocalCandidate {
        peer: ParticipantId,
        epoch: Epoch,
        candidate: Option<RTCIceCandidateInit>,
    },
    /// A local description was created and set.
    LocalDescription {
        peer: ParticipantId,
        epoch: Epoch,
        description: RTCSessionDescription,
    },
    Connectivity {
        peer: ParticipantId,
        epoch: Epoch,
        state: Connectivity,
    },
    RemoteTrack {
        peer: ParticipantId,
        epoch: Epoch,
        track: T,
    },
}

/// Negotiation step routed to a peer's negotiation task.
#[derive(Debug)]
pub(crate) enum Command {
    Offer,
    ApplyRemote(RTCSessionDescription),
    AddCandidate(RTCIceCandidateInit),
}

pub struct Coordinator<C: Connector, P> {
    local: Participant,
    media: LocalMedia,
    connector: C,
    presenter: P,
    relay: RelaySender,
    registry: PeerRegistry<C::Connection>,
    events_tx: UnboundedSender<Event<C::Track>>,
    events_rx: UnboundedReceiver<Event<C::Track>>,
    next_epoch: Epoch,
}

impl<C, P> Coordinator<C, P>
where
    C: Connector,
    P: Presenter<C::Track>,
{
    pub fn new(
        local: Participant,
        media: LocalMedia,
        connector: C,
        presenter: P,
        relay: RelaySender,
    ) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Coordinator {
            local,
            media,
            connector,
            presenter,
            relay,
            registry: PeerRegistry::new(),
            events_tx,
            events_rx,
            next_epoch: 1,
        }
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    pub fn registry(&self) -> &PeerRegistry<C::Connection> {
        &self.registry
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Handle for queueing events from outside the coordinator.
    pub fn events(&self) -> UnboundedSender<Event<C::Track>> {
        self.events_tx.clone()
    }

    /// Feeds relay envelopes into the event queue, in delivery order.
    /// Malformed envelopes are logged and skipped; any other error, or the end
    /// of the stream, is reported as [Event::RelayClosed].
    pub fn forward<S>(&self, inbound: S)
    where
        S: Stream<Item = Result<Envelope, Error>> + Send + 'static,
    {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let mut inbound = Box::pin(inbound);
            while let Some(item) = inbound.next().await {
                match item {
                    Ok(envelope) => {
                        if events.send(Event::Signal(envelope)).is_err() {
                            return;
                        }
                    }
                    Err(Error::Envelope(reason)) => {
                        warn!("discarding malformed envelope: {}", reason)
                    }
                    Err(e) => {
                        let _ = events.send(Event::RelayClosed(Some(e)));
                        return;
                    }
                }
            }
            let _ = events.send(Event::RelayClosed(None));
        });
    }

    /// Tells every participant on the relay that we are here.
    pub fn announce(&self) -> Result<(), Error> {
        info!(
            "announcing {} as '{}'",
            self.local.id, self.local.display_name
        );
        self.relay.send(Envelope::announce(
            self.local.id.clone(),
            Destination::All,
            self.local.display_name.clone(),
        ))
    }

    /// Processes events until a fatal error. All peer connections are closed
    /// before returning.
    pub async fn run(mut self) -> Result<(), Error> {
        loop {
            if let Err(e) = self.step().await {
                if e.is_fatal() {
                    error!("stopping session coordinator: {}", e);
                    self.shutdown().await;
                    return Err(e);
                }
                warn!("{}", e);
            }
        }
    }

    /// Waits for the next queued event and handles it.
    pub async fn step(&mut self) -> Result<(), Error> {
        // the coordinator holds a sender itself, so the queue never runs dry
        match self.events_rx.recv().await {
            Some(event) => self.handle(event).await,
            None => Err(Error::RelayClosed),
        }
    }

    pub async fn handle(&mut self, event: Event<C::Track>) -> Result<(), Error> {
        match event {
            Event::Signal(envelope) => self.on_signal(envelope).await,
            Event::RelayClosed(cause) => Err(cause.unwrap_or(Error::RelayClosed)),
            Event::LocalCandidate {
                peer,
                epoch,
                candidate,
            } => self.on_local_candidate(peer, epoch, candidate),
            Event::LocalDescription {
                peer,
                epoch,
                description,
            } => self.on_local_description(peer, epoch, description),
            Event::Connectivity { peer, epoch, state } => {
                self.on_connectivity(peer, epoch, state).await;
                Ok(())
            }
            Event::RemoteTrack { peer, epoch, track } => {
                self.on_remote_track(peer, epoch, track);
                Ok(())
            }
        }
    }

    async fn on_signal(&mut self, envelope: Envelope) -> Result<(), Error> {
        if envelope.sender == self.local.id {
            trace!("ignoring own {} envelope", envelope.payload.kind());
            return Ok(());
        }
        if !envelope.destination.accepts(&self.local.id) {
            trace!(
                "ignoring {} envelope from {} addressed to someone else",
                envelope.payload.kind(),
                envelope.sender
            );
            return Ok(());
        }
        let Envelope {
            sender,
            destination,
            payload,
        } = envelope;
        match payload {
            Payload::Announce { display_name } if destination.is_broadcast() => {
                self.on_newcomer(sender, display_name).await
            }
            Payload::Announce { display_name } => {
                self.on_reply(sender, display_name).await;
                Ok(())
            }
            Payload::Description(sdp) => {
                match self.registry.get_mut(&sender) {
                    Some(session) => {
                        debug!("received {:?} from {}", sdp.sdp_type, sender);
                        session.remote_described = true;
                        session.negotiate(Command::ApplyRemote(sdp));
                    }
                    None => warn!("{:?} from unknown peer {}, discarding", sdp.sdp_type, sender),
                }
                Ok(())
            }
            Payload::Candidate(candidate) => {
                match self.registry.get(&sender) {
                    Some(session) => session.negotiate(Command::AddCandidate(candidate)),
                    None => debug!("candidate from unknown peer {}, discarding", sender),
                }
                Ok(())
            }
        }
    }

    /// Someone joined the relay: answer their offer once it comes.
    async fn on_newcomer(&mut self, peer: ParticipantId, display_name: String) -> Result<(), Error> {
        if self.registry.contains(&peer) {
            debug!("{} announced again, keeping existing session", peer);
            return Ok(());
        }
        info!("'{}' ({}) joined", display_name, peer);
        if self.open_session(peer.clone(), display_name, Role::Answerer).await {
            self.relay.send(Envelope::announce(
                self.local.id.clone(),
                Destination::Participant(peer),
                self.local.display_name.clone(),
            ))?;
        }
        Ok(())
    }

    /// An existing participant replied to our announce: we offer.
    async fn on_reply(&mut self, peer: ParticipantId, display_name: String) {
        match self.registry.get_mut(&peer) {
            None => {
                info!("'{}' ({}) is here, sending offer", display_name, peer);
                self.open_session(peer, display_name, Role::Offerer).await;
            }
            // Both sides took the other for the newcomer. The higher id offers,
            // the lower one keeps waiting for that offer.
            Some(session)
                if session.role == Role::Answerer
                    && !session.remote_described
                    && self.local.id > peer =>
            {
                info!("simultaneous join with {}, taking the offerer role", peer);
                session.role = Role::Offerer;
                session.negotiate(Command::Offer);
            }
            Some(_) => debug!("ignoring repeated announce from {}", peer),
        }
    }

    /// Creates the connection and negotiation task for a new peer. Returns
    /// false if the connection could not be created.
    async fn open_session(&mut self, peer: ParticipantId, display_name: String, role: Role) -> bool {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let hooks = PeerHooks::new(peer.clone(), epoch, self.events_tx.clone());
        let connection = match self.connector.connect(&self.media, hooks.clone()).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("failed to create connection for {}: {}", peer, e);
                return false;
            }
        };

        let (commands, rx) = unbounded_channel();
        tokio::spawn(negotiate(Arc::clone(&connection), hooks, rx));

        let session = PeerSession {
            id: peer.clone(),
            display_name,
            role,
            state: SessionState::Negotiating,
            epoch,
            remote_described: false,
            surfaced: false,
            connection,
            commands,
        };
        if role == Role::Offerer {
            session.negotiate(Command::Offer);
        }
        self.registry.upsert(peer, session);
        true
    }

    fn on_local_candidate(
        &mut self,
        peer: ParticipantId,
        epoch: Epoch,
        candidate: Option<RTCIceCandidateInit>,
    ) -> Result<(), Error> {
        let candidate = match candidate.filter(|c| !c.candidate.is_empty()) {
            Some(candidate) => candidate,
            None => {
                debug!("finished gathering candidates for {}", peer);
                return Ok(());
            }
        };
        if self.registry.current(&peer, epoch).is_none() {
            trace!("dropping candidate for stale session with {}", peer);
            return Ok(());
        }
        self.relay
            .send(Envelope::candidate(self.local.id.clone(), peer, candidate))
    }

    fn on_local_description(
        &mut self,
        peer: ParticipantId,
        epoch: Epoch,
        description: RTCSessionDescription,
    ) -> Result<(), Error> {
        if self.registry.current(&peer, epoch).is_none() {
            debug!(
                "dropping {:?} for {}: session no longer exists",
                description.sdp_type, peer
            );
            return Ok(());
        }
        debug!("sending {:?} to {}", description.sdp_type, peer);
        self.relay
            .send(Envelope::description(self.local.id.clone(), peer, description))
    }

    async fn on_connectivity(&mut self, peer: ParticipantId, epoch: Epoch, state: Connectivity) {
        let session = match self.registry.current(&peer, epoch) {
            Some(session) => session,
            None => {
                trace!("ignoring {:?} of stale session with {}", state, peer);
                return;
            }
        };
        if state.is_terminal() {
            info!("connection with {} is {:?}, removing peer", peer, state);
            self.teardown(&peer).await;
        } else if state.is_connected() && session.state == SessionState::Negotiating {
            info!("connected to '{}' ({})", session.display_name, peer);
            session.state = SessionState::Connected;
        } else {
            debug!("connection with {} is {:?}", peer, state);
        }
    }

    fn on_remote_track(&mut self, peer: ParticipantId, epoch: Epoch, track: C::Track) {
        let first = match self.registry.current(&peer, epoch) {
            Some(session) => {
                let first = !session.surfaced;
                session.surfaced = true;
                self.presenter
                    .remote_stream_available(&peer, &session.display_name, track);
                first
            }
            None => {
                trace!("ignoring remote track of stale session with {}", peer);
                return;
            }
        };
        if first {
            self.presenter
                .participant_count_changed(self.registry.participant_count());
        }
    }

    async fn teardown(&mut self, peer: &ParticipantId) {
        if let Some(session) = self.registry.remove(peer) {
            self.presenter.peer_removed(peer);
            self.presenter
                .participant_count_changed(self.registry.participant_count());
            if let Err(e) = session.connection.close().await {
                warn!("failed to close connection with {}: {}", peer, e);
            }
        }
    }

    async fn shutdown(&mut self) {
        let sessions: Vec<_> = self.registry.drain().collect();
        for session in sessions {
            if let Err(e) = session.connection.close().await {
                warn!("failed to close connection with {}: {}", session.id, e);
            }
        }
    }
}

/// Per-peer negotiation task. Runs the routed steps in order; failures are
/// logged and leave the session as it is.
async fn negotiate<C, T>(
    connection: Arc<C>,
    hooks: PeerHooks<T>,
    mut commands: UnboundedReceiver<Command>,
) where
    C: Connection,
    T: Send + 'static,
{
    let peer = hooks.peer().clone();
    // candidates that arrived before the remote description
    let mut pending: Vec<RTCIceCandidateInit> = Vec::new();
    while let Some(command) = commands.recv().await {
        match command {
            Command::Offer => match describe(&*connection, Role::Offerer).await {
                Ok(offer) => hooks.local_description(offer),
                Err(e) => warn!("failed to create offer for {}: {}", peer, e),
            },
            Command::ApplyRemote(sdp) => {
                let is_offer = sdp.sdp_type == RTCSdpType::Offer;
                if let Err(e) = connection.set_remote_description(sdp).await {
                    warn!("failed to set remote description from {}: {}", peer, e);
                    continue;
                }
                for candidate in pending.drain(..) {
                    add_candidate(&*connection, &peer, candidate).await;
                }
                if is_offer {
                    match describe(&*connection, Role::Answerer).await {
                        Ok(answer) => hooks.local_description(answer),
                        Err(e) => warn!("failed to create answer for {}: {}", peer, e),
                    }
                }
            }
            Command::AddCandidate(candidate) => {
                if connection.has_remote_description().await {
                    add_candidate(&*connection, &peer, candidate).await;
                } else {
                    trace!("holding candidate from {} until its description", peer);
                    pending.push(candidate);
                }
            }
        }
    }
    trace!("negotiation with {} finished", peer);
}

/// Creates the offer or answer for `role`, sets it as the local description
/// and returns what the connection reports back.
async fn describe<C: Connection>(
    connection: &C,
    role: Role,
) -> Result<RTCSessionDescription, Error> {
    let description = match role {
        Role::Offerer => connection.create_offer().await?,
        Role::Answerer => connection.create_answer().await?,
    };
    connection.set_local_description(description.clone()).await?;
    Ok(connection.local_description().await.unwrap_or(description))
}

async fn add_candidate<C: Connection>(
    connection: &C,
    peer: &ParticipantId,
    candidate: RTCIceCandidateInit,
) {
    if let Err(e) = connection.add_ice_candidate(candidate).await {
        warn!("failed to add candidate from {}: {}", peer, e);
    }
}
