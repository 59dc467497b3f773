//! Signaling envelopes exchanged through the relay.
//!
//! On the wire an envelope is a flat JSON object with the sender (`uuid`), the
//! destination (`dest`) and exactly one payload field, whose presence tells the
//! kind apart:
//!
//! ```json
//! { "uuid": "…", "dest": "all", "displayName": "Swift Otter" }
//! { "uuid": "…", "dest": "…", "sdp": { "type": "offer", "sdp": "v=0…" } }
//! { "uuid": "…", "dest": "…", "ice": { "candidate": "candidate:…", "sdpMid": "0", "sdpMLineIndex": 0 } }
//! ```
//!
//! Inside the crate the same message is an [Envelope] carrying an explicit
//! [Payload] variant.

use crate::error::Error;
use crate::identity::ParticipantId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const BROADCAST: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Every participant connected to the relay.
    All,
    Participant(ParticipantId),
}

impl Destination {
    /// Checks if an envelope with this destination is meant for `local`.
    pub fn accepts(&self, local: &ParticipantId) -> bool {
        match self {
            Destination::All => true,
            Destination::Participant(id) => id == local,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Destination::All)
    }
}

impl Serialize for Destination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Destination::All => serializer.serialize_str(BROADCAST),
            Destination::Participant(id) => serializer.serialize_str(id.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Destination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dest = String::deserialize(deserializer)?;
        Ok(if dest == BROADCAST {
            Destination::All
        } else {
            Destination::Participant(dest.into())
        })
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Announce { display_name: String },
    Description(RTCSessionDescription),
    Candidate(RTCIceCandidateInit),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Announce { .. } => "announce",
            Payload::Description(sdp) if sdp.sdp_type == RTCSdpType::Offer => "offer",
            Payload::Description(sdp) if sdp.sdp_type == RTCSdpType::Answer => "answer",
            Payload::Description(_) => "description",
            Payload::Candidate(_) => "candidate",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub struct Envelope {
    pub sender: ParticipantId,
    pub destination: Destination,
    pub payload: Payload,
}

impl Envelope {
    pub fn announce<N: Into<String>>(
        sender: ParticipantId,
        destination: Destination,
        display_name: N,
    ) -> Self {
        Envelope {
            sender,
            destination,
            payload: Payload::Announce {
                display_name: display_name.into(),
            },
        }
    }

    pub fn description(
        sender: ParticipantId,
        peer: ParticipantId,
        sdp: RTCSessionDescription,
    ) -> Self {
        Envelope {
            sender,
            destination: Destination::Participant(peer),
            payload: Payload::Description(sdp),
        }
    }

    pub fn candidate(
        sender: ParticipantId,
        peer: ParticipantId,
        candidate: RTCIceCandidateInit,
    ) -> Self {
        Envelope {
            sender,
            destination: Destination::Participant(peer),
            payload: Payload::Candidate(candidate),
        }
    }

    pub fn decode(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Flat JSON shape used on the relay.
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    uuid: ParticipantId,
    dest: Destination,
    #[serde(
        rename = "displayName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sdp: Option<RTCSessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ice: Option<RTCIceCandidateInit>,
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = Error;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        if wire.uuid.as_str().is_empty() {
            return Err(Error::envelope("empty sender id"));
        }
        // browser clients check the fields in this order
        let payload = if let Some(display_name) = wire.display_name {
            Payload::Announce { display_name }
        } else if let Some(sdp) = wire.sdp {
            Payload::Description(sdp)
        } else if let Some(ice) = wire.ice {
            Payload::Candidate(ice)
        } else {
            return Err(Error::envelope("envelope carries no payload"));
        };
        Ok(Envelope {
            sender: wire.uuid,
            destination: wire.dest,
            payload,
        })
    }
}

impl From<Envelope> for WireEnvelope {
    fn from(envelope: Envelope) -> Self {
        let mut wire = WireEnvelope {
            uuid: envelope.sender,
            dest: envelope.destination,
            display_name: None,
            sdp: None,
            ice: None,
        };
        match envelope.payload {
            Payload::Announce { display_name } => wire.display_name = Some(display_name),
            Payload::Description(sdp) => wire.sdp = Some(sdp),
            Payload::Candidate(ice) => wire.ice = Some(ice),
        }
        wire
    }
}
