use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use crate::errors::{AllocationError, GeneratorError};
use crate::utils::base62;
use crate::utils::id_generator::IdGenerator;

type Result<T> = std::result::Result<T, AllocationError>;

/// Code chosen for one origin URL of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub origin_url: String,
    pub short_code: String,
    /// False when the code was reused, either from storage or from an
    /// earlier occurrence of the same URL in the batch.
    pub is_new: bool,
}

/// Turns generator output into short codes that are unique against a set of
/// codes already known to be taken.
///
/// The known set is owned by the caller and lives for one request. Storage
/// uniqueness remains the final arbiter; this only avoids minting codes that
/// are certain to fail.
#[derive(Clone)]
pub struct ShortCodeAllocator {
    generator: Arc<dyn IdGenerator>,
    max_attempts: u32,
}

impl ShortCodeAllocator {
    pub fn new(generator: Arc<dyn IdGenerator>, max_attempts: u32) -> Self {
        Self {
            generator,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `encode(reduce(next_id()))`
    pub fn generate_short_code(&self) -> std::result::Result<String, GeneratorError> {
        let id = self.generator.next_id()?;
        Ok(base62::encode(base62::reduce(id)))
    }

    /// Mint a code absent from `known` and add it to `known`.
    ///
    /// ### Errors
    /// * `AllocationError::Generator` - the generator refused to produce an id
    /// * `AllocationError::Exhausted` - every attempt collided
    pub fn allocate_one(&self, known: &mut HashSet<String>) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let code = self.generate_short_code()?;
            if known.insert(code.clone()) {
                return Ok(code);
            }
            debug!("Short code '{}' already taken (attempt {})", code, attempt);
        }

        warn!(
            "No free short code after {} attempts ({} codes known)",
            self.max_attempts,
            known.len()
        );
        Err(AllocationError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    /// Assign a code to every URL of `origin_urls`, preserving order.
    ///
    /// URLs found in `existing` keep their stored code. A URL repeated in the
    /// batch reuses the code of its first occurrence. Every other URL gets a
    /// fresh code unique against `known`, the existing codes and the codes
    /// minted earlier in this batch.
    pub fn allocate_batch(
        &self,
        origin_urls: &[String],
        existing: &HashMap<String, String>,
        known: &mut HashSet<String>,
    ) -> Result<Vec<Allocation>> {
        known.extend(existing.values().cloned());

        let mut minted: HashMap<&str, String> = HashMap::new();
        let mut allocations = Vec::with_capacity(origin_urls.len());

        for url in origin_urls {
            let (short_code, is_new) = if let Some(code) = existing.get(url) {
                (code.clone(), false)
            } else if let Some(code) = minted.get(url.as_str()) {
                (code.clone(), false)
            } else {
                let code = self.allocate_one(known)?;
                minted.insert(url.as_str(), code.clone());
                (code, true)
            };

            allocations.push(Allocation {
                origin_url: url.clone(),
                short_code,
                is_new,
            });
        }

        debug!(
            "Allocated {} new codes for {} URLs",
            minted.len(),
            origin_urls.len()
        );
        Ok(allocations)
    }
}
