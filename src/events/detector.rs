use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{
    super::{
        save_file::SaveFileRecord,
        types::{value_label, Entity, EntityId, EntityMapping, PlayerId, Snapshot, TechId, Turn},
    },
    EventType, GameEvent, SeenTechs,
};

fn city_name(id: EntityId, city: &Entity) -> String {
    city.get_string("name")
        .map(str::to_owned)
        .unwrap_or_else(|| format!("City {}", id))
}

fn with_location(event: GameEvent, city: &Entity) -> GameEvent {
    event.at(city.get_int("x").unwrap_or(0), city.get_int("y").unwrap_or(0))
}

fn city_founded(id: EntityId, city: &Entity, turn: Turn, initial: bool) -> GameEvent {
    let name = city_name(id, city);
    let owner = city.get_owner().unwrap_or(0);
    let description = if initial {
        format!("Initial city: {} (Player {})", name, owner)
    } else {
        format!("{} founded by Player {}", name, owner)
    };
    let event = GameEvent::new(turn, EventType::CityFounded, owner, description)
        .with("city_id", id)
        .with("city_name", name);
    let event = if initial { event.with("initial", true) } else { event };
    with_location(event, city)
}

fn city_conquered(
    id: EntityId,
    prev_owner: PlayerId,
    new_owner: PlayerId,
    city: &Entity,
    turn: Turn,
) -> GameEvent {
    let name = city_name(id, city);
    let event = GameEvent::new(
        turn,
        EventType::CityConquered,
        new_owner,
        format!(
            "{} conquered by Player {} from Player {}",
            name, new_owner, prev_owner
        ),
    )
    .with("city_id", id)
    .with("city_name", name)
    .with("prev_owner", prev_owner)
    .with("new_owner", new_owner);
    with_location(event, city)
}

fn city_destroyed(id: EntityId, city: &Entity, turn: Turn) -> GameEvent {
    let name = city_name(id, city);
    let owner = city.get_owner().unwrap_or(0);
    let event = GameEvent::new(
        turn,
        EventType::CityDestroyed,
        owner,
        format!("{} (Player {}) was destroyed", name, owner),
    )
    .with("city_id", id)
    .with("city_name", name);
    with_location(event, city)
}

/// Finds founded, conquered and destroyed cities.
///
/// With no previous snapshot every visible city is reported as an initial
/// founding.
pub fn detect_city_events(prev: Option<&Snapshot>, curr: &Snapshot, turn: Turn) -> Vec<GameEvent> {
    let Some(prev) = prev else {
        return curr
            .cities()
            .iter()
            .map(|(id, city)| city_founded(*id, city, turn, true))
            .collect();
    };
    let mut events = Vec::new();
    for (id, city) in curr.cities() {
        match prev.cities().get(id) {
            None => events.push(city_founded(*id, city, turn, false)),
            Some(old) => {
                if let (Some(prev_owner), Some(new_owner)) = (old.get_owner(), city.get_owner()) {
                    if prev_owner != new_owner {
                        events.push(city_conquered(*id, prev_owner, new_owner, city, turn));
                    }
                }
            }
        }
    }
    for (id, city) in prev.cities() {
        if !curr.cities().contains_key(id) {
            events.push(city_destroyed(*id, city, turn));
        }
    }
    events
}

/// Finds technologies whose `tech_<n>` flag became known between the two
/// snapshots. Techs already in `seen` are not reported again.
pub fn detect_tech_discoveries(
    prev: Option<&Snapshot>,
    curr: &Snapshot,
    turn: Turn,
    seen: &mut SeenTechs,
) -> Vec<GameEvent> {
    flag_tech_discoveries(prev, curr, turn, seen, |_| true)
}

/// Snapshot flag detection restricted to the players `include` accepts.
fn flag_tech_discoveries<F: Fn(PlayerId) -> bool>(
    prev: Option<&Snapshot>,
    curr: &Snapshot,
    turn: Turn,
    seen: &mut SeenTechs,
    include: F,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let Some(prev) = prev else {
        return events;
    };
    for (id, player) in curr.players() {
        if !include(*id) {
            continue;
        }
        let Some(old) = prev.player(*id) else {
            continue;
        };
        let before = old.known_techs();
        for tech in player.known_techs().difference(&before) {
            if !seen.announce(*id, tech) {
                continue;
            }
            events.push(
                GameEvent::new(
                    turn,
                    EventType::TechDiscovered,
                    *id,
                    format!("Technology #{} discovered", tech),
                )
                .with("tech_id", tech.as_str()),
            );
        }
    }
    events
}

/// Announces every technology in the save file's complete sets that wasn't
/// announced before. The names come from the current snapshot.
pub fn detect_savefile_tech_discoveries(
    curr: &Snapshot,
    technologies: &BTreeMap<PlayerId, BTreeSet<TechId>>,
    turn: Turn,
    seen: &mut SeenTechs,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for (player, techs) in technologies {
        let player_name = curr.player_name(*player);
        for tech in techs {
            if !seen.announce(*player, tech) {
                continue;
            }
            let tech_name = curr.tech_name(tech);
            events.push(
                GameEvent::new(
                    turn,
                    EventType::TechDiscovered,
                    *player,
                    format!("{} discovered {}", player_name, tech_name),
                )
                .with("tech_id", tech.as_str())
                .with("tech_name", tech_name),
            );
        }
    }
    events
}

/// Finds players whose government changed. Both governments must be known.
pub fn detect_government_changes(
    prev: Option<&Snapshot>,
    curr: &Snapshot,
    turn: Turn,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let Some(prev) = prev else {
        return events;
    };
    for (id, player) in curr.players() {
        let Some(old) = prev.player(*id) else {
            continue;
        };
        let from = old.get("government_name").map(value_label).unwrap_or_default();
        let to = player.get("government_name").map(value_label).unwrap_or_default();
        if from.is_empty() || to.is_empty() || from == to {
            continue;
        }
        events.push(
            GameEvent::new(
                turn,
                EventType::GovernmentChange,
                *id,
                format!(
                    "{} changed government from {} to {}",
                    curr.player_name(*id),
                    from,
                    to
                ),
            )
            .with("from", from)
            .with("to", to),
        );
    }
    events
}

/// Finds relations whose declared state changed.
pub fn detect_diplomatic_changes(
    prev: Option<&Snapshot>,
    curr: &Snapshot,
    turn: Turn,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let Some(prev) = prev else {
        return events;
    };
    for (key, relation) in curr.dipl() {
        let Some(old) = prev.dipl().get(key) else {
            continue;
        };
        let from = old.get("state").map(value_label).unwrap_or_default();
        let to = relation.get("state").map(value_label).unwrap_or_default();
        if from == to {
            continue;
        }
        let player1 = relation.get_int("player1").unwrap_or(0);
        let player2 = relation.get_int("player2").unwrap_or(0);
        events.push(
            GameEvent::new(
                turn,
                EventType::DiplomaticChange,
                player1,
                format!(
                    "Diplomatic state between Player {} and Player {} changed from {} to {}",
                    player1, player2, from, to
                ),
            )
            .with("player1", player1)
            .with("player2", player2)
            .with("from_state", from)
            .with("to_state", to),
        );
    }
    events
}

/// Runs every detector over a turn transition.
///
/// Technology discoveries of a player come from the save file when it holds
/// that player's technology set for the turn, and from the snapshot flags
/// otherwise.
pub fn detect_all_events(
    prev: Option<&Snapshot>,
    curr: &Snapshot,
    turn: Turn,
    save: Option<&SaveFileRecord>,
    seen: &mut SeenTechs,
) -> Vec<GameEvent> {
    let mut events = detect_city_events(prev, curr, turn);
    events.extend(detect_government_changes(prev, curr, turn));
    events.extend(detect_diplomatic_changes(prev, curr, turn));
    match save {
        Some(save) => {
            events.extend(detect_savefile_tech_discoveries(
                curr,
                &save.technologies,
                turn,
                seen,
            ));
            events.extend(flag_tech_discoveries(prev, curr, turn, seen, |id| {
                !save.technologies.contains_key(&id)
            }));
        }
        None => events.extend(detect_tech_discoveries(prev, curr, turn, seen)),
    }
    debug!("turn {}: {} events", turn, events.len());
    events
}
