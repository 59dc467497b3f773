use crate::coordinator::{Epoch, Event};
use crate::error::Error;
use crate::identity::ParticipantId;
use crate::media::LocalMedia;
use crate::options::Options;
use async_trait::async_trait;
use log::{debug, trace, warn};
use std::fmt::Formatter;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_remote::TrackRemote;

/// Connectivity state of a single peer connection, as reported by ICE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl Connectivity {
    /// Terminal states tear the peer session down. `Disconnected` counts as
    /// terminal: there is no recovery window.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Connectivity::Disconnected | Connectivity::Failed | Connectivity::Closed
        )
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Connectivity::Connected | Connectivity::Completed)
    }
}

impl From<RTCIceConnectionState> for Connectivity {
    fn from(value: RTCIceConnectionState) -> Self {
        match value {
            RTCIceConnectionState::Unspecified | RTCIceConnectionState::New => Connectivity::New,
            RTCIceConnectionState::Checking => Connectivity::Checking,
            RTCIceConnectionState::Connected => Connectivity::Connected,
            RTCIceConnectionState::Completed => Connectivity::Completed,
            RTCIceConnectionState::Disconnected => Connectivity::Disconnected,
            RTCIceConnectionState::Failed => Connectivity::Failed,
            RTCIceConnectionState::Closed => Connectivity::Closed,
        }
    }
}

/// Callback sink handed to a connection when it is created. Every callback is
/// turned into an [Event] tagged with the peer id and session epoch and queued
/// on the coordinator, which is the only place where they are acted upon.
pub struct PeerHooks<T> {
    peer: ParticipantId,
    epoch: Epoch,
    events: UnboundedSender<Event<T>>,
}

impl<T> PeerHooks<T> {
    pub(crate) fn new(peer: ParticipantId, epoch: Epoch, events: UnboundedSender<Event<T>>) -> Self {
        PeerHooks {
            peer,
            epoch,
            events,
        }
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    /// A locally gathered candidate. `None` marks the end of gathering.
    pub fn local_candidate(&self, candidate: Option<RTCIceCandidateInit>) {
        let _ = self.events.send(Event::LocalCandidate {
            peer: self.peer.clone(),
            epoch: self.epoch,
            candidate,
        });
    }

    pub fn connectivity(&self, state: Connectivity) {
        let _ = self.events.send(Event::Connectivity {
            peer: self.peer.clone(),
            epoch: self.epoch,
            state,
        });
    }

    pub fn remote_track(&self, track: T) {
        let _ = self.events.send(Event::RemoteTrack {
            peer: self.peer.clone(),
            epoch: self.epoch,
            track,
        });
    }

    pub(crate) fn local_description(&self, description: RTCSessionDescription) {
        let _ = self.events.send(Event::LocalDescription {
            peer: self.peer.clone(),
            epoch: self.epoch,
            description,
        });
    }
}

impl<T> Clone for PeerHooks<T> {
    fn clone(&self) -> Self {
        PeerHooks {
            peer: self.peer.clone(),
            epoch: self.epoch,
            events: self.events.clone(),
        }
    }
}

/// Negotiation surface of one peer connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn create_offer(&self) -> Result<RTCSessionDescription, Error>;
    async fn create_answer(&self) -> Result<RTCSessionDescription, Error>;
    async fn set_local_description(&self, sdp: RTCSessionDescription) -> Result<(), Error>;
    /// Current local description, including any candidates gathered so far.
    async fn local_description(&self) -> Option<RTCSessionDescription>;
    async fn set_remote_description(&self, sdp: RTCSessionDescription) -> Result<(), Error>;
    async fn has_remote_description(&self) -> bool;
    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), Error>;
    async fn close(&self) -> Result<(), Error>;
}

/// Factory of peer connections. Each new connection gets the local media
/// tracks attached and reports its callbacks through `hooks`.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;
    /// Handle of a remote media track delivered to the presentation layer.
    type Track: Send + 'static;

    async fn connect(
        &self,
        media: &LocalMedia,
        hooks: PeerHooks<Self::Track>,
    ) -> Result<Arc<Self::Connection>, Error>;
}

/// [Connector] backed by webrtc-rs.
pub struct RtcConnector {
    api: API,
    config: RTCConfiguration,
}

impl RtcConnector {
    pub fn new(options: &Options) -> Result<Self, Error> {
        // Create a MediaEngine object to configure the supported codec
        let mut media_engine = MediaEngine::default();

        // Register default codecs
        media_engine.register_default_codecs()?;

        // Interceptors provide NACKs, RTCP reports and other features. Each
        // RTCPeerConnection needs them registered on the API it comes from.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(RtcConnector {
            api,
            config: options.rtc_config(),
        })
    }
}

#[async_trait]
impl Connector for RtcConnector {
    type Connection = RtcConnection;
    type Track = Arc<TrackRemote>;

    async fn connect(
        &self,
        media: &LocalMedia,
        hooks: PeerHooks<Arc<TrackRemote>>,
    ) -> Result<Arc<RtcConnection>, Error> {
        let pc = Arc::new(self.api.new_peer_connection(self.config.clone()).await?);

        {
            let hooks = hooks.clone();
            pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                match candidate {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => hooks.local_candidate(Some(init)),
                        Err(e) => warn!("dropping local candidate for {}: {}", hooks.peer(), e),
                    },
                    None => hooks.local_candidate(None),
                }
                Box::pin(async move {})
            }));
        }
        {
            let hooks = hooks.clone();
            pc.on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
                debug!("ICE connection with {} is {}", hooks.peer(), s);
                hooks.connectivity(s.into());
                Box::pin(async move {})
            }));
        }
        {
            let hooks = hooks.clone();
            pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                match s {
                    RTCPeerConnectionState::Closed => hooks.connectivity(Connectivity::Closed),
                    RTCPeerConnectionState::Failed => hooks.connectivity(Connectivity::Failed),
                    RTCPeerConnectionState::Unspecified
                    | RTCPeerConnectionState::New
                    | RTCPeerConnectionState::Connecting
                    | RTCPeerConnectionState::Connected
                    | RTCPeerConnectionState::Disconnected => {}
                }
                Box::pin(async move {})
            }));
        }
        {
            let hooks = hooks.clone();
            pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
                trace!("remote {:?} track from {}", track.kind(), hooks.peer());
                hooks.remote_track(track);
                Box::pin(async move {})
            }));
        }

        for track in media.track_locals() {
            let sender = pc.add_track(track).await?;
            // RTCP has to be read for the interceptors (NACK etc.) to work
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1500];
                while sender.read(&mut buf).await.is_ok() {}
            });
        }

        Ok(Arc::new(RtcConnection { pc }))
    }
}

/// WebRTC peer connection negotiated by a peer session.
pub struct RtcConnection {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl Connection for RtcConnection {
    async fn create_offer(&self) -> Result<RTCSessionDescription, Error> {
        Ok(self.pc.create_offer(None).await?)
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription, Error> {
        Ok(self.pc.create_answer(None).await?)
    }

    async fn set_local_description(&self, sdp: RTCSessionDescription) -> Result<(), Error> {
        Ok(self.pc.set_local_description(sdp).await?)
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.pc.local_description().await
    }

    async fn set_remote_description(&self, sdp: RTCSessionDescription) -> Result<(), Error> {
        Ok(self.pc.set_remote_description(sdp).await?)
    }

    async fn has_remote_description(&self) -> bool {
        self.pc.remote_description().await.is_some()
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), Error> {
        Ok(self.pc.add_ice_candidate(candidate).await?)
    }

    async fn close(&self) -> Result<(), Error> {
        Ok(self.pc.close().await?)
    }
}

impl AsRef<RTCPeerConnection> for RtcConnection {
    fn as_ref(&self) -> &RTCPeerConnection {
        &self.pc
    }
}

impl std::fmt::Debug for RtcConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtcConnection")
            .field("connection_state", &self.pc.connection_state())
            .field("ice_connection_state", &self.pc.ice_connection_state())
            .finish()
    }
}
