use std::collections::{BTreeMap, BTreeSet};

use derive_more::{Display, Error, From};
use serde_json::{Map, Value};
use tracing::debug;

/// A player id. Recordings store these as strings or integers, we always
/// normalise them to integers at the boundary.
pub type PlayerId = i64;

/// An id of a city, unit or technology inside a snapshot.
pub type EntityId = i64;

/// A simulation turn.
pub type Turn = u32;

/// A technology identifier. Both the save file and the recordings name
/// technologies by their numeric index, which we keep in textual form.
pub type TechId = String;

/// The attributes of a single entity (player, city, unit...).
pub type Entity = Map<String, Value>;

/// The state value the engine uses for a known technology.
pub const TECH_KNOWN: i64 = 18;

/// Prefix of the per-player technology flags, `tech_<n>`.
const TECH_FLAG_PREFIX: &str = "tech_";

/// Returns true if a technology flag value means "known".
fn is_tech_known(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(TECH_KNOWN),
        _ => false,
    }
}

/// Turns an arbitrary scalar into a human readable label.
pub fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Typed access to the loosely typed attributes of an [Entity].
/// Integers that arrive string-encoded are coerced.
pub trait EntityMapping {
    /// Get an integer attribute
    fn get_int(&self, key: &str) -> Option<i64>;

    /// Get a numeric attribute
    fn get_real(&self, key: &str) -> Option<f64>;

    /// Get a string attribute
    fn get_string(&self, key: &str) -> Option<&str>;

    /// Get a boolean attribute
    fn get_bool(&self, key: &str) -> Option<bool>;

    /// The owning player of the entity, if any
    fn get_owner(&self) -> Option<PlayerId> {
        self.get_int("owner")
    }

    /// The set of technologies flagged as known on this entity.
    fn known_techs(&self) -> BTreeSet<TechId>;
}

impl EntityMapping for Entity {
    fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_real(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn known_techs(&self) -> BTreeSet<TechId> {
        self.iter()
            .filter_map(|(key, value)| {
                let id = key.strip_prefix(TECH_FLAG_PREFIX)?;
                if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                if is_tech_known(value) {
                    Some(id.to_owned())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// An error that can occur when turning JSON into a [Snapshot].
#[derive(Debug, From, Display, Error)]
pub enum SnapshotError {
    /// The JSON itself is broken
    JsonError(serde_json::Error),
    /// The top level JSON value is not an object
    #[display("snapshot root is not an object")]
    NotAnObject,
}

/// Collects an id->entity category, normalising the ids to integers.
fn integer_keyed(category: &str, value: Option<Value>) -> BTreeMap<EntityId, Entity> {
    let mut out = BTreeMap::new();
    let Some(Value::Object(map)) = value else {
        return out;
    };
    for (key, entity) in map {
        let Ok(id) = key.trim().parse::<EntityId>() else {
            debug!("dropping non numeric {} key {:?}", category, key);
            continue;
        };
        match entity {
            Value::Object(entity) => {
                out.insert(id, entity);
            }
            _ => {
                debug!("dropping non object {} entry {}", category, id);
            }
        }
    }
    out
}

/// One observation of the game, as seen by the recording client.
/// Visibility is limited by fog of war, so absence of an entity does not
/// prove it doesn't exist.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    players: BTreeMap<PlayerId, Entity>,
    cities: BTreeMap<EntityId, Entity>,
    units: BTreeMap<EntityId, Entity>,
    techs: BTreeMap<EntityId, Entity>,
    dipl: BTreeMap<String, Entity>,
    map: Entity,
}

impl Snapshot {
    /// Parses a snapshot from its JSON text.
    pub fn from_json(contents: &str) -> Result<Self, SnapshotError> {
        Self::from_value(serde_json::from_str(contents)?)
    }

    /// Builds a snapshot from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        let Value::Object(mut root) = value else {
            return Err(SnapshotError::NotAnObject);
        };
        let mut dipl = BTreeMap::new();
        if let Some(Value::Object(map)) = root.remove("dipl") {
            for (key, rel) in map {
                if let Value::Object(rel) = rel {
                    dipl.insert(key, rel);
                }
            }
        }
        let map = match root.remove("map") {
            Some(Value::Object(map)) => map,
            _ => Entity::new(),
        };
        Ok(Snapshot {
            players: integer_keyed("player", root.remove("player")),
            cities: integer_keyed("city", root.remove("city")),
            units: integer_keyed("unit", root.remove("unit")),
            techs: integer_keyed("tech", root.remove("tech")),
            dipl,
            map,
        })
    }

    pub fn players(&self) -> &BTreeMap<PlayerId, Entity> {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Entity> {
        self.players.get(&id)
    }

    pub fn cities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.cities
    }

    pub fn units(&self) -> &BTreeMap<EntityId, Entity> {
        &self.units
    }

    pub fn techs(&self) -> &BTreeMap<EntityId, Entity> {
        &self.techs
    }

    /// Diplomatic relations, keyed by the recording's pair key.
    pub fn dipl(&self) -> &BTreeMap<String, Entity> {
        &self.dipl
    }

    pub fn map(&self) -> &Entity {
        &self.map
    }

    /// Name of the player as recorded, or a synthesized label.
    pub fn player_name(&self, id: PlayerId) -> String {
        self.player(id)
            .and_then(|p| p.get_string("name"))
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Player {}", id))
    }

    /// Name of a technology as recorded, or a synthesized label.
    pub fn tech_name(&self, id: &str) -> String {
        id.parse::<EntityId>()
            .ok()
            .and_then(|id| self.techs.get(&id))
            .and_then(|t| t.get_string("name"))
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Tech #{}", id))
    }
}
