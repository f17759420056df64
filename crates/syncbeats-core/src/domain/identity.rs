//! Domain identifiers.
//!
//! These are **pure data**: no I/O, no framework dependencies.

use std::fmt;
use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque room identifier (assigned by the room service).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

/// A user name. Usernames double as user identifiers on the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// A video identifier as understood by the playback engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl RoomId {
    pub const GENERATED_LEN: usize = 8;

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random id of uppercase letters and digits, as the room service
    /// assigns them.
    pub fn generate() -> Self {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::thread_rng();
        let id = (0..Self::GENERATED_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract a video id from a bare 11-character id or a YouTube link
    /// (`watch?v=`, `youtu.be/`, `embed/`, `v/`, `e/`, `u/<x>/`).
    pub fn parse(input: &str) -> Option<Self> {
        static LINK: OnceLock<Regex> = OnceLock::new();
        static BARE: OnceLock<Regex> = OnceLock::new();

        let input = input.trim();
        let link = LINK.get_or_init(|| {
            Regex::new(r"^.*(youtu\.be/|v/|e/|u/\w+/|embed/|v=)([^#&?]*).*")
                .expect("static regex")
        });
        if let Some(id) = link.captures(input).and_then(|c| c.get(2)) {
            if id.as_str().len() == 11 {
                return Some(Self(id.as_str().to_string()));
            }
        }

        let bare = BARE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("static regex"));
        bare.is_match(input).then(|| Self(input.to_string()))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Generated display names
// ---------------------------------------------------------------------------

const ADJECTIVES: &[&str] = &[
    "Happy", "Curious", "Brave", "Clever", "Swift", "Calm", "Bold", "Bright",
];
const ANIMALS: &[&str] = &[
    "Dolphin", "Panda", "Tiger", "Eagle", "Fox", "Wolf", "Hawk", "Otter",
];

/// Random `<Adjective><Animal><0..999>` name for users that did not pick one.
pub fn generate_username() -> UserId {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Happy");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("Otter");
    let number: u16 = rng.gen_range(0..1000);
    UserId(format!("{adjective}{animal}{number}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_id() {
        assert_eq!(VideoId::parse("dQw4w9WgXcQ"), Some(VideoId::new("dQw4w9WgXcQ")));
    }

    #[test]
    fn parses_common_link_forms() {
        for link in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1",
        ] {
            assert_eq!(VideoId::parse(link), Some(VideoId::new("dQw4w9WgXcQ")), "{link}");
        }
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(VideoId::parse("not a video"), None);
        assert_eq!(VideoId::parse("https://youtu.be/short"), None);
        assert_eq!(VideoId::parse(""), None);
    }

    #[test]
    fn generated_room_ids_are_uppercase_alphanumeric() {
        let id = RoomId::generate();
        assert_eq!(id.as_str().len(), RoomId::GENERATED_LEN);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn generated_usernames_have_expected_shape() {
        let name = generate_username();
        assert!(ADJECTIVES.iter().any(|a| name.as_str().starts_with(a)));
        assert!(name.as_str().chars().last().is_some_and(|c| c.is_ascii_digit()));
    }
}
