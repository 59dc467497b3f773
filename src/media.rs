use crate::error::Error;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        VideoConstraints {
            max_width: 320,
            max_height: 240,
            max_frame_rate: 30,
        }
    }
}

/// What the local participant is willing to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        MediaConstraints {
            video: Some(VideoConstraints::default()),
            audio: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub kind: MediaKind,
    pub track: Arc<TrackLocalStaticSample>,
}

/// The outgoing stream. Acquired once and shared read-only by every peer
/// connection; connections attach its tracks, they never take them over.
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    stream_id: String,
    tracks: Vec<LocalTrack>,
}

impl LocalMedia {
    pub fn new(stream_id: String, tracks: Vec<LocalTrack>) -> Self {
        LocalMedia { stream_id, tracks }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks in the shape expected by `RTCPeerConnection::add_track`.
    pub fn track_locals(&self) -> impl Iterator<Item = Arc<dyn TrackLocal + Send + Sync>> + '_ {
        self.tracks
            .iter()
            .map(|t| Arc::clone(&t.track) as Arc<dyn TrackLocal + Send + Sync>)
    }

    /// Pushes one encoded frame (VP8 for video, Opus for audio) to every
    /// connection the track is attached to.
    pub async fn write_sample(
        &self,
        kind: MediaKind,
        data: Bytes,
        duration: Duration,
    ) -> Result<(), Error> {
        let track = self
            .tracks
            .iter()
            .find(|t| t.kind == kind)
            .ok_or_else(|| Error::Media(format!("no local {kind:?} track")))?;
        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };
        track.track.write_sample(&sample).await?;
        Ok(())
    }
}

/// Acquisition of the local media stream.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, Error>;
}

/// Media source producing sample-fed tracks: VP8 video and Opus audio. Frames
/// come from an external capture pipeline through [LocalMedia::write_sample].
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleTracks;

#[async_trait]
impl MediaSource for SampleTracks {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia, Error> {
        let stream_id = Uuid::new_v4().to_string();
        let mut tracks = Vec::new();
        if constraints.video.is_some() {
            let codec = RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            };
            tracks.push(LocalTrack {
                kind: MediaKind::Video,
                track: Arc::new(TrackLocalStaticSample::new(
                    codec,
                    "video".to_owned(),
                    stream_id.clone(),
                )),
            });
        }
        if constraints.audio {
            let codec = RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            };
            tracks.push(LocalTrack {
                kind: MediaKind::Audio,
                track: Arc::new(TrackLocalStaticSample::new(
                    codec,
                    "audio".to_owned(),
                    stream_id.clone(),
                )),
            });
        }
        if tracks.is_empty() {
            return Err(Error::Media("neither audio nor video requested".to_owned()));
        }
        Ok(LocalMedia::new(stream_id, tracks))
    }
}
