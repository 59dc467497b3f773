use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::identity::Participant;
use crate::media::MediaSource;
use crate::options::Options;
use crate::peer_connection::RtcConnector;
use crate::presentation::Presenter;
use crate::relay;
use log::{error, info};
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Joins the conference reachable through `options.relay_url` and stays in it
/// until the relay goes away.
///
/// Startup is strict: if the local media cannot be acquired or the relay
/// cannot be reached, no peer session is created and the error is returned.
/// Once running, the call only returns with the error that ended it, since a
/// lost relay is never reconnected.
pub async fn join<S, P>(options: Options, media: &S, presenter: P) -> Result<(), Error>
where
    S: MediaSource + ?Sized,
    P: Presenter<Arc<TrackRemote>>,
{
    options.validate()?;
    let local = Participant::generate();
    info!("starting as '{}' ({})", local.display_name, local.id);

    let media = media.acquire(&options.media).await.map_err(|e| {
        error!("cannot acquire local media: {}", e);
        e
    })?;
    let connector = RtcConnector::new(&options)?;
    let (sender, inbound) = relay::connect(&options.relay_url).await.map_err(|e| {
        error!("cannot open relay {}: {}", options.relay_url, e);
        e
    })?;

    let coordinator = Coordinator::new(local, media, connector, presenter, sender);
    coordinator.forward(inbound);
    coordinator.announce()?;
    coordinator.run().await
}
