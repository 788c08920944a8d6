//! Snail name generation

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "Slippery", "Turbo", "Sluggish", "Gooey", "Mighty", "Shiny", "Sneaky", "Dizzy",
    "Lazy", "Rapid", "Crusty", "Velvet", "Soggy", "Golden", "Midnight", "Lucky",
    "Grumpy", "Fearless", "Misty", "Rusty", "Silent", "Cosmic", "Nimble", "Steady",
];

const NOUNS: &[&str] = &[
    "Slime", "Shell", "Trail", "Comet", "Pebble", "Thunder", "Drizzle", "Moss",
    "Spiral", "Garden", "Lettuce", "Dewdrop", "Boulder", "Whisper", "Rocket", "Mushroom",
    "Puddle", "Clover", "Ember", "Glacier", "Nebula", "Sprout", "Biscuit", "Marble",
];

const TITLES: &[&str] = &["Sir", "Lady", "Captain", "Doctor", "Old", "Little"];

/// Generate a display name such as "Captain Turbo Slime"
///
/// A title is added to roughly one name in four.
pub fn generate_snail_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Plain");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Snail");

    if rng.gen_bool(0.25) {
        let title = TITLES.choose(rng).copied().unwrap_or("Sir");
        format!("{} {} {}", title, adjective, noun)
    } else {
        format!("{} {}", adjective, noun)
    }
}
