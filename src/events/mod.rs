use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{PlayerId, TechId, Turn};

/// A submodule that derives events from consecutive snapshots
mod detector;
pub use detector::{
    detect_all_events, detect_city_events, detect_diplomatic_changes, detect_government_changes,
    detect_savefile_tech_discoveries, detect_tech_discoveries,
};

/// The kind of a [GameEvent].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CityFounded,
    CityConquered,
    CityDestroyed,
    TechDiscovered,
    GovernmentChange,
    DiplomaticChange,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CityFounded => "city_founded",
            EventType::CityConquered => "city_conquered",
            EventType::CityDestroyed => "city_destroyed",
            EventType::TechDiscovered => "tech_discovered",
            EventType::GovernmentChange => "government_change",
            EventType::DiplomaticChange => "diplomatic_change",
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete historical event, inferred from a turn transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub turn: Turn,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub player_id: PlayerId,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<(i64, i64)>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl GameEvent {
    pub fn new(
        turn: Turn,
        event_type: EventType,
        player_id: PlayerId,
        description: String,
    ) -> Self {
        GameEvent {
            turn,
            event_type,
            player_id,
            description,
            location: None,
            metadata: Map::new(),
        }
    }

    pub fn at(mut self, x: i64, y: i64) -> Self {
        self.location = Some((x, y));
        self
    }

    /// Adds a metadata entry
    pub fn with<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

/// The technologies already announced per player.
///
/// Owned by whoever walks the turns, and threaded through the detection
/// calls, so that a technology seen through both the snapshots and the save
/// files is only announced once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenTechs(BTreeMap<PlayerId, BTreeSet<TechId>>);

impl SeenTechs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the tech as seen, returns true if it wasn't already.
    pub fn announce(&mut self, player: PlayerId, tech: &str) -> bool {
        let seen = self.0.entry(player).or_default();
        if seen.contains(tech) {
            false
        } else {
            seen.insert(tech.to_owned());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize() {
        let event = GameEvent::new(4, EventType::CityFounded, 1, "Ur founded".to_owned())
            .at(3, 7)
            .with("city_id", 12);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "turn": 4,
                "type": "city_founded",
                "player_id": 1,
                "description": "Ur founded",
                "location": [3, 7],
                "metadata": {"city_id": 12}
            })
        );
        let bare = GameEvent::new(4, EventType::TechDiscovered, 1, String::new());
        let value = serde_json::to_value(&bare).unwrap();
        assert!(value.get("location").is_none());
        assert!(value.get("metadata").is_none());
        let back: GameEvent = serde_json::from_value(serde_json::to_value(&event).unwrap()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_seen_techs() {
        let mut seen = SeenTechs::new();
        assert!(seen.announce(1, "4"));
        assert!(!seen.announce(1, "4"));
        assert!(seen.announce(2, "4"));
        assert!(!seen.announce(2, "4"));
        assert!(seen.announce(3, "4"));
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::GovernmentChange.to_string(), "government_change");
    }
}
