//! Word tables for slug keys.
//!
//! 80 adjectives x 80 nouns gives 6,400 distinct slugs.  Order matters:
//! the random source picks by index.

/// Adjectives, first half of every slug.
pub static ADJECTIVES: [&str; 80] = [
    "quick", "lazy", "happy", "sad", "bright", "dark", "warm", "cool", "swift", "slow",
    "brave", "calm", "eager", "fancy", "gentle", "jolly", "kind", "lively", "merry", "nice",
    "proud", "silly", "witty", "zany", "bold", "clever", "daring", "fierce", "grand", "humble",
    "keen", "loyal", "mighty", "noble", "odd", "plain", "quiet", "rare", "sharp", "tough",
    "vast", "wild", "young", "zealous", "ancient", "cosmic", "dusty", "elegant", "frozen", "golden",
    "hidden", "icy", "jade", "knightly", "lunar", "misty", "neon", "orange", "purple", "rusty",
    "silver", "tiny", "ultra", "velvet", "wavy", "xenial", "yellow", "zinc", "azure", "bronze",
    "coral", "dapper", "ember", "frosty", "gleaming", "hazy", "ivory", "jumpy", "kooky", "lumpy",
];

/// Nouns, second half of every slug.
pub static NOUNS: [&str; 80] = [
    "fox", "dog", "cat", "bird", "fish", "lion", "bear", "wolf", "deer", "hawk",
    "owl", "frog", "duck", "goat", "lamb", "pony", "swan", "crow", "dove", "seal",
    "crab", "moth", "wasp", "newt", "toad", "hare", "mole", "vole", "wren", "lark",
    "pike", "bass", "trout", "shark", "whale", "squid", "clam", "snail", "beetle", "cricket",
    "dragon", "phoenix", "griffin", "unicorn", "pegasus", "sphinx", "hydra", "kraken", "titan", "golem",
    "wizard", "knight", "pirate", "ninja", "robot", "alien", "ghost", "zombie", "vampire", "demon",
    "planet", "comet", "nebula", "quasar", "pulsar", "galaxy", "cosmos", "aurora", "eclipse", "meteor",
    "mountain", "river", "forest", "desert", "island", "volcano", "glacier", "canyon", "meadow", "ocean",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_words_are_unique() {
        assert_eq!(ADJECTIVES.iter().collect::<HashSet<_>>().len(), ADJECTIVES.len());
        assert_eq!(NOUNS.iter().collect::<HashSet<_>>().len(), NOUNS.len());
    }

    #[test]
    fn test_words_are_lowercase_ascii_without_separators() {
        for word in ADJECTIVES.iter().chain(NOUNS.iter()) {
            assert!(!word.is_empty());
            assert!(word.chars().all(|c| c.is_ascii_lowercase()), "bad word: {word}");
        }
    }
}
