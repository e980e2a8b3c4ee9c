//! Storage key generation.
//!
//! Two strategies sit behind [`KeyGenerator`]:
//!
//! - [`SlugGenerator`]: `adjective-noun` drawn from fixed word lists.  The
//!   space is small (6,400 keys) so candidates are probed against the store
//!   and regenerated on collision.
//! - [`UuidGenerator`]: a random v4 UUID, suffixed `.ext` when an
//!   extension is known.  Never probed.
//!
//! Exactly one strategy is active per process; [`allocate_key`] holds the
//! shared collision logic.

pub mod random;
pub mod words;

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::metrics::{KEY_COLLISIONS_EXHAUSTED_TOTAL, KEY_COLLISIONS_TOTAL};
use crate::storage::backend::BlobStore;
use random::{RandomSource, ThreadRandom};
use words::{ADJECTIVES, NOUNS};

/// Attempts made before giving up on finding a free slug.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Configured key strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Human-readable `adjective-noun` keys.
    #[default]
    Slug,
    /// Random UUID keys.
    Uuid,
}

impl KeyStrategy {
    /// Lowercase name, as written in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStrategy::Slug => "slug",
            KeyStrategy::Uuid => "uuid",
        }
    }
}

/// Produces candidate storage keys, independent of file content.
pub trait KeyGenerator: Send + Sync + 'static {
    /// Produce one candidate key.  `extension` is the resolved file
    /// extension (possibly empty); strategies may ignore it.
    fn generate(&self, extension: &str) -> String;

    /// Whether candidates must be checked against the store before use.
    fn needs_probe(&self) -> bool;

    /// Whether the extension should be kept in the object's metadata for
    /// download-side filename synthesis.
    fn records_extension(&self) -> bool;
}

/// `adjective-noun` slugs.
pub struct SlugGenerator {
    random: Arc<dyn RandomSource>,
}

impl SlugGenerator {
    /// Create a slug generator drawing from `random`.
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }
}

impl KeyGenerator for SlugGenerator {
    fn generate(&self, _extension: &str) -> String {
        let adjective = ADJECTIVES[self.random.next_int(ADJECTIVES.len())];
        let noun = NOUNS[self.random.next_int(NOUNS.len())];
        format!("{adjective}-{noun}")
    }

    fn needs_probe(&self) -> bool {
        true
    }

    fn records_extension(&self) -> bool {
        true
    }
}

/// Random v4 UUID keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

/// Longest extension carried into a UUID key.
const MAX_KEY_EXTENSION_LEN: usize = 10;

/// Whether `extension` can be appended to a key as-is: a short run of
/// ASCII letters and digits.
fn is_key_extension(extension: &str) -> bool {
    !extension.is_empty()
        && extension.len() <= MAX_KEY_EXTENSION_LEN
        && extension.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl KeyGenerator for UuidGenerator {
    fn generate(&self, extension: &str) -> String {
        let id = uuid::Uuid::new_v4();
        if is_key_extension(extension) {
            format!("{id}.{extension}")
        } else {
            id.to_string()
        }
    }

    fn needs_probe(&self) -> bool {
        false
    }

    fn records_extension(&self) -> bool {
        false
    }
}

/// Build the generator for `strategy` using the thread RNG.
pub fn build_generator(strategy: KeyStrategy) -> Arc<dyn KeyGenerator> {
    match strategy {
        KeyStrategy::Slug => Arc::new(SlugGenerator::new(Arc::new(ThreadRandom))),
        KeyStrategy::Uuid => Arc::new(UuidGenerator),
    }
}

/// Pick the key a new upload will be stored under.
///
/// Generators that need probing get up to `max_attempts` candidates
/// checked with [`BlobStore::has`].  When every candidate is taken the
/// last one is returned anyway and the upload overwrites it.  Probe and
/// put are separate store calls, so two concurrent uploads can still land
/// on the same free slug.
pub async fn allocate_key(
    store: &dyn BlobStore,
    generator: &dyn KeyGenerator,
    extension: &str,
    max_attempts: u32,
) -> anyhow::Result<String> {
    let mut key = generator.generate(extension);
    if !generator.needs_probe() {
        return Ok(key);
    }

    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        if attempt > 1 {
            key = generator.generate(extension);
        }
        if !store.has(&key).await? {
            debug!("Allocated key {} on attempt {}", key, attempt);
            return Ok(key);
        }
        metrics::counter!(KEY_COLLISIONS_TOTAL).increment(1);
        debug!("Key {} already taken (attempt {})", key, attempt);
    }

    metrics::counter!(KEY_COLLISIONS_EXHAUSTED_TOTAL).increment(1);
    warn!(
        "All {} key candidates collided; reusing {} (existing object will be overwritten)",
        attempts, key
    );
    Ok(key)
}
