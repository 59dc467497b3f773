//! `peermesh` is a mesh video conferencing client built on the
//! [webrtc](https://webrtc.rs) library:
//! - Participants find each other through a rendezvous relay reached over a
//!   WebSocket, which only forwards JSON signaling envelopes.
//! - Every pair of participants negotiates its own direct peer connection;
//!   media never goes through the relay.
//! - The wire format matches the one used by browser clients of the same
//!   relay, so both can sit in the same conference.
//!
//! A newcomer announces itself to everyone. Each participant already present
//! replies directly and waits for the newcomer's offer, which it answers.
//! Connectivity candidates are traded the same way until ICE connects. A
//! connection that fails, closes or disconnects removes that peer.
//!
//! Rendering is left to a [Presenter], local media comes from a [MediaSource].
//!
//! # Examples
//!
//! ```no_run
//! use peermesh::{join, Error, Layout, Options, ParticipantId, Presenter, SampleTracks};
//! use std::sync::Arc;
//! use webrtc::track::track_remote::TrackRemote;
//!
//! struct Console;
//!
//! impl Presenter<Arc<TrackRemote>> for Console {
//!     fn remote_stream_available(&mut self, peer: &ParticipantId, name: &str, _: Arc<TrackRemote>) {
//!         println!("receiving media from {name} ({peer})");
//!     }
//!
//!     fn peer_removed(&mut self, peer: &ParticipantId) {
//!         println!("{peer} left");
//!     }
//!
//!     fn participant_count_changed(&mut self, count: usize) {
//!         let layout = Layout::for_participants(count);
//!         println!("{count} on screen, {0}x{0} grid", layout.grid);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let options = Options::new("wss://relay.example.org");
//!     // returns only once the relay is gone
//!     join(options, &SampleTracks, Console).await
//! }
//! ```

pub mod client;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod media;
pub mod options;
pub mod peer_connection;
pub mod presentation;
pub mod registry;
pub mod relay;
#[cfg(test)]
mod testing;

pub use client::join;
pub use coordinator::{Coordinator, Event};
pub use envelope::{Destination, Envelope, Payload};
pub use error::Error;
pub use identity::{Participant, ParticipantId};
pub use media::{LocalMedia, MediaConstraints, MediaSource, SampleTracks};
pub use options::Options;
pub use peer_connection::{Connection, Connectivity, Connector, RtcConnector};
pub use presentation::{Layout, Presenter};
pub use registry::{PeerRegistry, PeerSession, Role, SessionState};
