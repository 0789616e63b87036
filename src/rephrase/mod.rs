//! Instruction rephrasing
//!
//! A cached front over an external rephrasing service. When the service is
//! not configured or fails, the original sentence is served.

pub mod cache;
pub mod client;

pub use cache::RephraseCache;
pub use client::{AzureOpenAiRephraser, Rephraser};

use uuid::Uuid;

/// Number of cached phrasings kept per sentence
pub const VARIANTS: u8 = 2;

/// Pick a phrasing variant in `1..=VARIANTS`
pub fn pick_variant() -> u8 {
    Uuid::new_v4().as_bytes()[0] % VARIANTS + 1
}

/// Rephrase `sentence` through the cache. Empty sentences and a missing
/// rephraser return the sentence unchanged.
pub fn rephrase_cached(
    cache: &RephraseCache,
    rephraser: Option<&dyn Rephraser>,
    sentence: &str,
    variant: u8,
) -> String {
    match rephraser {
        Some(rephraser) if !sentence.trim().is_empty() => {
            cache.try_get_or_compute(sentence, variant, |s, v| rephraser.rephrase(s, v))
        }
        _ => sentence.to_string(),
    }
}
