use crate::coordinator::{Command, Epoch};
use crate::identity::ParticipantId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Which side of the offer/answer exchange the local participant plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We joined after the peer: we send the offer.
    Offerer,
    /// The peer is the newcomer: we answer its offer.
    Answerer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiating,
    Connected,
}

/// One remote participant.
pub struct PeerSession<C> {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
    pub state: SessionState,
    /// Distinguishes this session from earlier ones with the same peer id, so
    /// late callbacks of a torn down connection are not mistaken for ours.
    pub epoch: Epoch,
    /// Set once a remote description has been routed to the negotiation task.
    pub remote_described: bool,
    /// Set once the first remote track has been handed to the presenter.
    pub surfaced: bool,
    pub(crate) connection: Arc<C>,
    pub(crate) commands: UnboundedSender<Command>,
}

impl<C> PeerSession<C> {
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// Queues a negotiation step on the session's negotiation task.
    pub(crate) fn negotiate(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::warn!("negotiation task for {} has stopped", self.id);
        }
    }
}

impl<C> std::fmt::Debug for PeerSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSession")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Peer id → session map. Owned by a single coordinator, which is its only
/// writer.
pub struct PeerRegistry<C> {
    peers: HashMap<ParticipantId, PeerSession<C>>,
}

impl<C> PeerRegistry<C> {
    pub fn new() -> Self {
        PeerRegistry {
            peers: HashMap::new(),
        }
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&PeerSession<C>> {
        self.peers.get(id)
    }

    pub fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut PeerSession<C>> {
        self.peers.get_mut(id)
    }

    /// Returns the session only if it still belongs to `epoch`.
    pub fn current(&mut self, id: &ParticipantId, epoch: Epoch) -> Option<&mut PeerSession<C>> {
        self.peers.get_mut(id).filter(|s| s.epoch == epoch)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.peers.contains_key(id)
    }

    /// Inserts or replaces the session stored under `id`, returning the
    /// replaced one.
    pub fn upsert(&mut self, id: ParticipantId, session: PeerSession<C>) -> Option<PeerSession<C>> {
        self.peers.insert(id, session)
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<PeerSession<C>> {
        self.peers.remove(id)
    }

    pub fn size(&self) -> usize {
        self.peers.len()
    }

    /// Participants on screen: every peer plus the local one.
    pub fn participant_count(&self) -> usize {
        self.size() + 1
    }

    /// Empties the registry, handing out every session.
    pub fn drain(&mut self) -> impl Iterator<Item = PeerSession<C>> + '_ {
        self.peers.drain().map(|(_, session)| session)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &PeerSession<C>> {
        self.peers.values()
    }
}

impl<C> Default for PeerRegistry<C> {
    fn default() -> Self {
        PeerRegistry::new()
    }
}
