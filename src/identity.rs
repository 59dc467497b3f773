use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use uuid::Uuid;

/// Opaque participant identifier. It addresses every signaling envelope and
/// keys the peer registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Generates a fresh, process-unique identifier.
    pub fn new() -> Self {
        ParticipantId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        ParticipantId::new()
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        ParticipantId(value)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        ParticipantId(value.to_owned())
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

const ADJECTIVES: &[&str] = &[
    "Amber", "Brave", "Calm", "Clever", "Curious", "Eager", "Gentle", "Happy", "Jolly", "Keen",
    "Lively", "Lucky", "Mellow", "Nimble", "Proud", "Quick", "Quiet", "Rapid", "Silent", "Sunny",
    "Swift", "Tidy", "Witty", "Zesty",
];

const ANIMALS: &[&str] = &[
    "Badger", "Beaver", "Bison", "Crane", "Dolphin", "Falcon", "Ferret", "Gecko", "Heron",
    "Koala", "Lemur", "Lynx", "Marten", "Otter", "Panda", "Puffin", "Raven", "Seal", "Stoat",
    "Tapir", "Walrus", "Wombat", "Yak", "Zebra",
];

/// Picks a human readable display name such as `"Swift Otter"`.
pub fn new_display_name() -> String {
    let mut rng = rand::thread_rng();
    // both word lists are non-empty constants
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Anonymous");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("Peer");
    format!("{adjective} {animal}")
}

/// Identity of the local participant, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
}

impl Participant {
    pub fn generate() -> Self {
        Participant {
            id: ParticipantId::new(),
            display_name: new_display_name(),
        }
    }

    pub fn new<N: Into<String>>(id: ParticipantId, display_name: N) -> Self {
        Participant {
            id,
            display_name: display_name.into(),
        }
    }
}
