//! Scripted connection backend used by unit tests. Every call is recorded on a
//! channel and callbacks are fired by hand through the stored hooks.

use crate::error::Error;
use crate::identity::ParticipantId;
use crate::media::LocalMedia;
use crate::peer_connection::{Connection, Connector, PeerHooks};
use crate::presentation::Presenter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    CreateOffer,
    CreateAnswer,
    SetLocal(RTCSdpType),
    SetRemote(RTCSdpType),
    AddCandidate(String),
    Close,
}

pub(crate) fn description(sdp_type: RTCSdpType, sdp: &str) -> RTCSessionDescription {
    let mut description = RTCSessionDescription::default();
    description.sdp_type = sdp_type;
    description.sdp = sdp.to_owned();
    description
}

pub(crate) fn candidate(candidate: &str) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

fn rejected() -> Error {
    webrtc::Error::ErrConnectionClosed.into()
}

pub(crate) struct ScriptedConnection {
    peer: ParticipantId,
    calls: UnboundedSender<(ParticipantId, Call)>,
    reject_remote: bool,
    local: Mutex<Option<RTCSessionDescription>>,
    remote: Mutex<Option<RTCSessionDescription>>,
}

impl ScriptedConnection {
    fn record(&self, call: Call) {
        let _ = self.calls.send((self.peer.clone(), call));
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn create_offer(&self) -> Result<RTCSessionDescription, Error> {
        self.record(Call::CreateOffer);
        Ok(description(RTCSdpType::Offer, &format!("offer for {}", self.peer)))
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription, Error> {
        self.record(Call::CreateAnswer);
        match &*self.remote.lock().unwrap() {
            Some(remote) if remote.sdp_type == RTCSdpType::Offer => Ok(description(
                RTCSdpType::Answer,
                &format!("answer for {}", self.peer),
            )),
            _ => Err(rejected()),
        }
    }

    async fn set_local_description(&self, sdp: RTCSessionDescription) -> Result<(), Error> {
        self.record(Call::SetLocal(sdp.sdp_type));
        *self.local.lock().unwrap() = Some(sdp);
        Ok(())
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.local.lock().unwrap().clone()
    }

    async fn set_remote_description(&self, sdp: RTCSessionDescription) -> Result<(), Error> {
        self.record(Call::SetRemote(sdp.sdp_type));
        if self.reject_remote {
            return Err(rejected());
        }
        *self.remote.lock().unwrap() = Some(sdp);
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.remote.lock().unwrap().is_some()
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), Error> {
        self.record(Call::AddCandidate(candidate.candidate));
        if self.remote.lock().unwrap().is_none() {
            return Err(rejected());
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.record(Call::Close);
        Ok(())
    }
}

/// Connector whose connections only record what they are asked to do. Remote
/// tracks are plain strings.
pub(crate) struct ScriptedConnector {
    calls: UnboundedSender<(ParticipantId, Call)>,
    hooks: Arc<Mutex<HashMap<ParticipantId, PeerHooks<String>>>>,
    pub reject_remote: bool,
}

pub(crate) type Hooks = Arc<Mutex<HashMap<ParticipantId, PeerHooks<String>>>>;

impl ScriptedConnector {
    pub fn new() -> (Self, UnboundedReceiver<(ParticipantId, Call)>, Hooks) {
        let (calls, rx) = unbounded_channel();
        let hooks: Hooks = Arc::default();
        let connector = ScriptedConnector {
            calls,
            hooks: hooks.clone(),
            reject_remote: false,
        };
        (connector, rx, hooks)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;
    type Track = String;

    async fn connect(
        &self,
        _media: &LocalMedia,
        hooks: PeerHooks<String>,
    ) -> Result<Arc<ScriptedConnection>, Error> {
        let peer = hooks.peer().clone();
        self.hooks.lock().unwrap().insert(peer.clone(), hooks);
        Ok(Arc::new(ScriptedConnection {
            peer,
            calls: self.calls.clone(),
            reject_remote: self.reject_remote,
            local: Mutex::new(None),
            remote: Mutex::new(None),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Shown {
    Stream(ParticipantId, String, String),
    Removed(ParticipantId),
    Count(usize),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingPresenter {
    pub shown: Vec<Shown>,
}

impl RecordingPresenter {
    pub fn removed(&self, peer: &ParticipantId) -> usize {
        self.shown
            .iter()
            .filter(|s| matches!(s, Shown::Removed(id) if id == peer))
            .count()
    }

    pub fn last_count(&self) -> Option<usize> {
        self.shown.iter().rev().find_map(|s| match s {
            Shown::Count(n) => Some(*n),
            _ => None,
        })
    }
}

impl Presenter<String> for RecordingPresenter {
    fn remote_stream_available(&mut self, peer: &ParticipantId, display_name: &str, track: String) {
        self.shown
            .push(Shown::Stream(peer.clone(), display_name.to_owned(), track));
    }

    fn peer_removed(&mut self, peer: &ParticipantId) {
        self.shown.push(Shown::Removed(peer.clone()));
    }

    fn participant_count_changed(&mut self, count: usize) {
        self.shown.push(Shown::Count(count));
    }
}
