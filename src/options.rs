use crate::error::Error;
use crate::media::MediaConstraints;
use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;

/// Client configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// WebSocket URL of the rendezvous relay.
    pub relay_url: String,
    /// STUN/TURN server URLs, handed to every peer connection.
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
    #[serde(default)]
    pub media: MediaConstraints,
}

fn default_ice_servers() -> Vec<String> {
    vec![
        "stun:stun.stunprotocol.org:3478".to_owned(),
        "stun:stun.l.google.com:19302".to_owned(),
    ]
}

impl Options {
    pub fn new<S: Into<String>>(relay_url: S) -> Self {
        Options {
            relay_url: relay_url.into(),
            ice_servers: default_ice_servers(),
            media: MediaConstraints::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let options: Options =
            serde_json::from_str(json).map_err(|e| Error::Options(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.relay_url.is_empty() {
            return Err(Error::Options("relay URL is empty".to_owned()));
        }
        if !(self.relay_url.starts_with("ws://") || self.relay_url.starts_with("wss://")) {
            return Err(Error::Options(format!(
                "relay URL must use ws:// or wss://, got `{}`",
                self.relay_url
            )));
        }
        for url in &self.ice_servers {
            let known = ["stun:", "turn:", "turns:"]
                .iter()
                .any(|scheme| url.starts_with(scheme));
            if !known {
                return Err(Error::Options(format!("unsupported ICE server URL `{url}`")));
            }
        }
        Ok(())
    }

    /// Configuration passed to every new peer connection.
    pub fn rtc_config(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}
