//! Name generation for pipeline-scoped resources
//!
//! Queues, intermediate buckets and trigger functions get human-readable
//! random names of the form `adjective-noun-1234`. The generated names are
//! lowercase and hyphenated so they are valid as bucket, queue and function
//! names alike.

use std::sync::atomic::{AtomicUsize, Ordering};

use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "autumn", "hidden", "bitter", "misty", "silent", "empty", "dry", "dark", "summer", "icy",
    "delicate", "quiet", "white", "cool", "spring", "winter", "patient", "twilight", "dawn",
    "crimson", "wispy", "weathered", "blue", "billowing", "broken", "cold", "damp", "falling",
    "frosty", "green", "long", "late", "lingering", "bold", "little", "morning", "muddy", "old",
    "red", "rough", "still", "small", "sparkling", "shy", "wandering", "withered", "wild",
    "black", "young", "holy", "solitary", "fragrant", "aged", "snowy", "proud", "floral",
    "restless", "divine", "polished", "ancient", "purple", "lively", "nameless",
];

const NOUNS: &[&str] = &[
    "waterfall", "river", "breeze", "moon", "rain", "wind", "sea", "morning", "snow", "lake",
    "sunset", "pine", "shadow", "leaf", "dawn", "glitter", "forest", "hill", "cloud", "meadow",
    "sun", "glade", "bird", "brook", "butterfly", "bush", "dew", "dust", "field", "fire",
    "flower", "firefly", "feather", "grass", "haze", "mountain", "night", "pond", "darkness",
    "snowflake", "silence", "sound", "sky", "shape", "surf", "thunder", "violet", "water",
    "wildflower", "wave", "resonance", "wood", "dream", "cherry", "tree", "fog", "frost",
    "voice", "paper", "frog", "smoke", "star",
];

/// Source of fresh resource names
///
/// One source is shared by the compiler (queues, intermediate buckets, run
/// names) and the provider (function names).
pub trait NameSource: Send + Sync {
    /// Returns a name that has not been returned before with high probability
    fn next_name(&self) -> String;
}

/// Random `adjective-noun-NNNN` names
#[derive(Debug, Default, Clone, Copy)]
pub struct HaikuNames;

impl HaikuNames {
    pub fn new() -> Self {
        Self
    }
}

impl NameSource for HaikuNames {
    fn next_name(&self) -> String {
        let bytes = *Uuid::new_v4().as_bytes();
        let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
        let noun = NOUNS[bytes[1] as usize % NOUNS.len()];
        let token = u16::from_be_bytes([bytes[2], bytes[3]]) % 10_000;
        format!("{}-{}-{:04}", adjective, noun, token)
    }
}

/// Deterministic `prefix-1`, `prefix-2`, ... names
///
/// Used where reproducible names matter, e.g. tests and dry runs.
#[derive(Debug)]
pub struct SequentialNames {
    prefix: String,
    counter: AtomicUsize,
}

impl SequentialNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicUsize::new(0),
        }
    }
}

impl NameSource for SequentialNames {
    fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", self.prefix, n)
    }
}
