/// A submodule that splits the save file into its `[name]` sections
mod section_reader;
pub use section_reader::{Section, SectionReader};

/// A submodule that resolves table schemas and tokenizes rows
mod table;
pub use table::{split_row, Row, Schema, Table};

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{
    super::types::{PlayerId, TechId},
    record::{Production, Relation, SaveFileRecord, Science},
};

static PLAYER_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^player(\d+)$").unwrap());
/// City rows start with three integers, the coordinates and the id
static CITY_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+,\d+,\d+,.+").unwrap());
static RESEARCH_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+,.+").unwrap());

static SCIENCE_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^rates\.science=(-?\d+)").unwrap());
static BULBS_LAST_TURN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^research\.bulbs_last_turn=(-?\d+)").unwrap());
static NATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^nation=(.*?)\s*$").unwrap());
static DIPLSTATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^diplstate(\d+)\.(\w+)=(.*?)\s*$").unwrap());
static LOVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:ai(\d+)\.love|love(\d+))=(-?\d+)").unwrap());

const CITY_TABLE: &str = "c";
const RESEARCH_TABLE: &str = "r";
const RESEARCH_SECTION: &str = "research";

/// Removes the quotes the engine puts around strings
fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

fn parse_bool(value: &str) -> bool {
    matches!(
        unquote(value).to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

/// Captures the first integer matched by `pattern` in the text.
fn find_int(pattern: &Regex, text: &str) -> Option<i64> {
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Sums the production of every city in the section's city table.
/// Returns None if the table or one of the needed columns is missing.
fn parse_city_production(section: &Section) -> Option<Production> {
    let table = Table::find(section.lines(), CITY_TABLE, &CITY_ROW)?;
    let size_idx = table.schema().index_of("size")?;
    let shield_idx = table.schema().index_of("last_turns_shield_surplus")?;
    let mut production = Production::default();
    for row in table.rows() {
        match (row.get_int(size_idx), row.get_int(shield_idx)) {
            (Some(size), Some(shields)) => production.add_city(size, shields),
            _ => {
                debug!("skipping malformed city row {:?}", row);
            }
        }
    }
    Some(production)
}

/// Parses the `diplstate<N>.*` and love entries of a player section.
fn parse_diplomacy(player: PlayerId, section: &Section) -> BTreeMap<PlayerId, Relation> {
    let mut relations: BTreeMap<PlayerId, Relation> = BTreeMap::new();
    let body = section.get_body();
    for captures in DIPLSTATE.captures_iter(body) {
        let Ok(other) = captures[1].parse::<PlayerId>() else {
            continue;
        };
        if other == player {
            continue;
        }
        let value = &captures[3];
        let relation = relations.entry(other).or_default();
        match &captures[2] {
            "current" | "type" => relation.state = Some(unquote(value).to_owned()),
            "first_contact_turn" => relation.first_contact_turn = unquote(value).parse().ok(),
            "embassy" | "has_real_embassy" => relation.embassy = parse_bool(value),
            "gives_shared_vision" => relation.shared_vision = parse_bool(value),
            _ => {}
        }
    }
    for captures in LOVE.captures_iter(body) {
        let Some(other) = captures
            .get(1)
            .or_else(|| captures.get(2))
            .and_then(|m| m.as_str().parse::<PlayerId>().ok())
        else {
            continue;
        };
        if other == player {
            continue;
        }
        relations.entry(other).or_default().love = captures[3].parse().ok();
    }
    relations
}

/// Extracts everything we need from a `[player<N>]` section.
fn parse_player_section(player: PlayerId, section: &Section, record: &mut SaveFileRecord) {
    let body = section.get_body();
    if let Some(production) = parse_city_production(section) {
        record.production.insert(player, production);
    } else {
        debug!("no usable city table for player {}", player);
    }
    record.science.insert(
        player,
        Science {
            science_per_turn: find_int(&SCIENCE_RATE, body).unwrap_or(0),
            bulbs_last_turn: find_int(&BULBS_LAST_TURN, body).unwrap_or(0),
            ..Default::default()
        },
    );
    if let Some(captures) = NATION.captures(body) {
        let nation = unquote(&captures[1]);
        if !nation.is_empty() {
            record.nations.insert(player, nation.to_owned());
        }
    }
    let relations = parse_diplomacy(player, section);
    if !relations.is_empty() {
        record.diplomacy.insert(player, relations);
    }
}

/// Interprets a `done` bit string, where position `i` set means tech `i` is known.
fn parse_done(done: &str) -> BTreeSet<TechId> {
    unquote(done)
        .chars()
        .enumerate()
        .filter(|(_, c)| *c == '1')
        .map(|(i, _)| i.to_string())
        .collect()
}

/// A single row of the research table.
struct ResearchRow {
    number: PlayerId,
    techs: i64,
    researching: Option<String>,
    done: Option<BTreeSet<TechId>>,
}

/// Parses the global `[research]` section.
fn parse_research_section(section: &Section) -> Vec<ResearchRow> {
    let Some(table) = Table::find(section.lines(), RESEARCH_TABLE, &RESEARCH_ROW) else {
        debug!("research section without a research table");
        return Vec::new();
    };
    let schema = table.schema();
    let (Some(number_idx), Some(techs_idx), Some(now_idx)) = (
        schema.index_of("number"),
        schema.index_of("techs"),
        schema.index_of("now_name"),
    ) else {
        debug!("research table is missing required columns");
        return Vec::new();
    };
    let done_idx = schema.index_of("done");
    let mut out = Vec::new();
    for row in table.rows() {
        let (Some(number), Some(techs), Some(now)) = (
            row.get_int(number_idx),
            row.get_int(techs_idx),
            row.get(now_idx),
        ) else {
            debug!("skipping malformed research row {:?}", row);
            continue;
        };
        let now = unquote(now);
        out.push(ResearchRow {
            number,
            techs,
            researching: if now.is_empty() {
                None
            } else {
                Some(now.to_owned())
            },
            done: done_idx.and_then(|i| row.get(i)).map(parse_done),
        });
    }
    out
}

/// Parses decompressed save file text into a [SaveFileRecord].
///
/// This never fails. Every section is interpreted with its own locally
/// declared schema, and a section that doesn't fit our expectations simply
/// contributes nothing.
pub fn parse_save_file(contents: &str) -> SaveFileRecord {
    let mut record = SaveFileRecord::default();
    let mut research = Vec::new();
    for section in SectionReader::new(contents) {
        let name = section.get_name();
        if name == RESEARCH_SECTION {
            research.extend(parse_research_section(&section));
        } else if let Some(captures) = PLAYER_SECTION.captures(name) {
            if let Ok(player) = captures[1].parse::<PlayerId>() {
                parse_player_section(player, &section, &mut record);
            }
        }
    }
    // the research section may come before or after the players
    for row in research {
        if let Some(science) = record.science.get_mut(&row.number) {
            science.techs_known = row.techs;
            science.researching = row.researching;
        }
        if let Some(done) = row.done {
            record.technologies.insert(row.number, done);
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAVE: &str = r#"
[savefile]
options=" +version3"
[player0]
name="Hammurabi"
nation="Babylonian"
rates.science=60
research.bulbs_last_turn=14
diplstate1.current="War"
diplstate1.first_contact_turn=12
diplstate1.embassy=TRUE
diplstate1.gives_shared_vision=FALSE
love1=-300
ncities=2
c={"y","x","id","name","size","food_stock","last_turns_shield_surplus"}
3,4,101,"Babylon, the first",5,10,6
7,8,102,"Ur",3,2,2
}
u={"x","y","id"}
1,1,55
[player1]
nation="Roman"
rates.science=40
c={"y","x","id","name","food_stock"}
1,1,103,"Rome",4
[research]
count=2
r={"number","goal_name","techs","now_name","done"}
0,"Monarchy",5,"Alphabet","1011001"
1,"",3,"","0100"
[map]
"#;

    #[test]
    fn test_production() {
        let record = parse_save_file(SAVE);
        let p0 = &record.production[&0];
        assert_eq!(p0.shields, 8.0);
        assert_eq!(p0.food, 16.0);
        assert_eq!(p0.trade, 8.0);
        // player1 declares no shield column
        assert!(!record.production.contains_key(&1));
    }

    #[test]
    fn test_short_schema() {
        let record = parse_save_file(
            "[player0]\nc={\"size\",\"last_turns_shield_surplus\"}\n0,0,1,4,7\n",
        );
        let p0 = &record.production[&0];
        assert_eq!(p0.shields, 7.0);
        assert_eq!(p0.food, 8.0);
        assert_eq!(p0.trade, 4.0);
    }

    #[test]
    fn test_science() {
        let record = parse_save_file(SAVE);
        let s0 = &record.science[&0];
        assert_eq!(s0.science_per_turn, 60);
        assert_eq!(s0.bulbs_last_turn, 14);
        assert_eq!(s0.techs_known, 5);
        assert_eq!(s0.researching.as_deref(), Some("Alphabet"));
        let s1 = &record.science[&1];
        assert_eq!(s1.techs_known, 3);
        assert_eq!(s1.researching, None);
    }

    #[test]
    fn test_technologies() {
        let record = parse_save_file(SAVE);
        let t0: Vec<_> = record.technologies[&0].iter().cloned().collect();
        assert_eq!(t0, vec!["0", "2", "3", "6"]);
        let t1: Vec<_> = record.technologies[&1].iter().cloned().collect();
        assert_eq!(t1, vec!["1"]);
    }

    #[test]
    fn test_nations() {
        let record = parse_save_file(SAVE);
        assert_eq!(record.nations[&0], "Babylonian");
        assert_eq!(record.nations[&1], "Roman");
    }

    #[test]
    fn test_diplomacy() {
        let record = parse_save_file(SAVE);
        let rel = &record.diplomacy[&0][&1];
        assert_eq!(rel.state.as_deref(), Some("War"));
        assert_eq!(rel.first_contact_turn, Some(12));
        assert_eq!(rel.love, Some(-300));
        assert!(rel.embassy);
        assert!(!rel.shared_vision);
        assert!(!record.diplomacy.contains_key(&1));
    }

    #[test]
    fn test_open_tables() {
        let record = parse_save_file(concat!(
            "[player0]\n",
            "c={\"y\",\"x\",\"id\",\"size\",\"last_turns_shield_surplus\"\n",
            "1,2,3,4,7\n",
            "}\n",
            "9,9,9,100,100\n",
            "[research]\n",
            "r={\"number\",\"techs\",\"now_name\",\"done\"\n",
            "0,3,\"Alphabet\",\"101\"\n",
            "}\n",
        ));
        assert_eq!(record.production[&0].shields, 7.0);
        assert_eq!(record.science[&0].techs_known, 3);
        let t0: Vec<_> = record.technologies[&0].iter().cloned().collect();
        assert_eq!(t0, vec!["0", "2"]);
    }

    #[test]
    fn test_research_without_done() {
        let record = parse_save_file(
            "[player2]\n[research]\nr={\"number\",\"techs\",\"now_name\"}\n2,9,\"Writing\"\n",
        );
        assert_eq!(record.science[&2].techs_known, 9);
        assert!(record.technologies.is_empty());
    }

    #[test]
    fn test_garbage() {
        let record = parse_save_file("this is\nnot a save file\n[player0\nc={\n1,2,3,x,y\n");
        assert!(record.production.is_empty());
        assert_eq!(parse_save_file(""), SaveFileRecord::default());
    }
}
