use crate::identity::ParticipantId;

/// Consumer of the events that change what is on screen. Rendering and layout
/// live behind this trait; the coordinator only reports.
pub trait Presenter<T>: Send {
    /// A remote media track arrived. Called once per track; the first call
    /// for a peer is where its surface should be created.
    fn remote_stream_available(&mut self, peer: &ParticipantId, display_name: &str, track: T);

    /// The peer session is gone and its surface should be removed.
    fn peer_removed(&mut self, peer: &ParticipantId);

    /// Number of participants on screen, the local one included.
    fn participant_count_changed(&mut self, count: usize);
}

/// Square video grid for a given number of participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Number of rows and columns.
    pub grid: u8,
    /// Width and height of a cell, in percent of the viewport.
    pub cell_percent: u8,
}

impl Layout {
    pub fn for_participants(count: usize) -> Self {
        match count {
            0 | 1 => Layout {
                grid: 1,
                cell_percent: 98,
            },
            2..=4 => Layout {
                grid: 2,
                cell_percent: 48,
            },
            _ => Layout {
                grid: 3,
                cell_percent: 32,
            },
        }
    }
}
