/// A submodule that loads the nation table of the game ruleset
mod ruleset;
pub use ruleset::{Nation, Ruleset, RulesetError};

/// Terrain types that are good for farming: forest, grassland, hills,
/// jungle, plains and swamp.
pub static ARABLE_TERRAIN: phf::Set<i64> = phf::phf_set! {
    5i64, 6i64, 7i64, 8i64, 10i64, 11i64,
};

/// Returns true if the terrain type counts as arable
pub fn is_arable(terrain: i64) -> bool {
    ARABLE_TERRAIN.contains(&terrain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arable() {
        assert!(is_arable(5));
        assert!(is_arable(11));
        assert!(!is_arable(9));
        assert!(!is_arable(-1));
    }
}
