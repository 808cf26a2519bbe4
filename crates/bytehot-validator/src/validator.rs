//! Validator facade: parse, diff, cache.

use std::time::{Duration, Instant};

use bytehot_observability::LruTtlCache;
use bytehot_types::{BytecodeHash, ValidationMode, Violation};

use crate::classfile::{self, ClassMetadata};

/// Default bound on the number of distinct bytecode digests cached.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Default time-to-live for a cached validation result.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// The outcome of validating one proposed class body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The proposed class body is redefinition-safe.
    Accepted {
        /// Metadata extracted from the proposed class body.
        metadata: ClassMetadata,
    },
    /// The proposed class body is not redefinition-safe, or could not be
    /// parsed at all.
    Rejected {
        /// Every incompatibility found (at least one).
        violations: Vec<Violation>,
    },
}

/// Bytecode compatibility validator, pure with respect to its input bytes
/// aside from the content-addressed result cache.
pub struct Validator {
    cache: LruTtlCache<BytecodeHash, ValidationOutcome>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

impl Validator {
    /// Build a validator with a cache of the given capacity and TTL.
    pub fn new(cache_capacity: usize, cache_ttl: Duration) -> Self {
        Self {
            cache: LruTtlCache::new(cache_capacity, cache_ttl),
        }
    }

    /// Validate `new_bytecode` against `previous_bytecode` (the currently
    /// loaded class body, if any — absent for a class's first load).
    ///
    /// Identical `new_bytecode` digests short-circuit from the cache, so
    /// re-validating the same bytes twice returns a byte-identical result.
    pub fn validate(
        &self,
        previous_bytecode: Option<&[u8]>,
        new_bytecode: &[u8],
        mode: ValidationMode,
        host_allows_method_addition: bool,
    ) -> (BytecodeHash, ValidationOutcome) {
        let digest = BytecodeHash::of(new_bytecode);
        let started = Instant::now();
        let outcome = self.cache.get_or_insert_with(digest, || {
            compute(previous_bytecode, new_bytecode, mode, host_allows_method_addition)
        });
        tracing::debug!(
            bytecode_hash = %digest,
            elapsed_us = started.elapsed().as_micros(),
            accepted = matches!(outcome, ValidationOutcome::Accepted { .. }),
            "validated bytecode"
        );
        (digest, outcome)
    }

    /// Number of distinct digests currently cached.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn compute(
    previous_bytecode: Option<&[u8]>,
    new_bytecode: &[u8],
    mode: ValidationMode,
    host_allows_method_addition: bool,
) -> ValidationOutcome {
    let after = match classfile::parse(new_bytecode) {
        Ok(metadata) => metadata,
        Err(err) => {
            return ValidationOutcome::Rejected {
                violations: vec![Violation::Malformed {
                    reason: err.to_string(),
                }],
            }
        }
    };

    let before = match previous_bytecode {
        None => return ValidationOutcome::Accepted { metadata: after },
        Some(bytes) => match classfile::parse(bytes) {
            Ok(metadata) => metadata,
            Err(err) => {
                return ValidationOutcome::Rejected {
                    violations: vec![Violation::Malformed {
                        reason: format!("previously loaded class body is unreadable: {err}"),
                    }]
                }
            }
        },
    };

    let allow_method_addition = matches!(mode, ValidationMode::Lenient) && host_allows_method_addition;
    let violations = crate::rules::diff_classes(&before, &after, allow_method_addition);
    if violations.is_empty() {
        ValidationOutcome::Accepted { metadata: after }
    } else {
        ValidationOutcome::Rejected { violations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_utf8(out: &mut Vec<u8>, s: &str) {
        out.push(1);
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn push_class(out: &mut Vec<u8>, name_index: u16) {
        out.push(7);
        out.extend_from_slice(&name_index.to_be_bytes());
    }

    fn build_with_methods(class_name: &str, methods: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&61u16.to_be_bytes());

        // pool: #1 Utf8(class), #2 Class(#1), #3 Utf8(super), #4 Class(#3),
        // then 2 Utf8 entries per method (name, descriptor).
        let pool_count = 1 + 4 + (methods.len() as u16) * 2;
        out.extend_from_slice(&pool_count.to_be_bytes());
        push_utf8(&mut out, class_name);
        push_class(&mut out, 1);
        push_utf8(&mut out, "java/lang/Object");
        push_class(&mut out, 3);
        let mut method_indices = Vec::new();
        let mut next_index = 5u16;
        for (name, descriptor) in methods {
            push_utf8(&mut out, name);
            let name_index = next_index;
            next_index += 1;
            push_utf8(&mut out, descriptor);
            let descriptor_index = next_index;
            next_index += 1;
            method_indices.push((name_index, descriptor_index));
        }

        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count
        out.extend_from_slice(&0u16.to_be_bytes()); // fields_count
        out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
        for (name_index, descriptor_index) in method_indices {
            out.extend_from_slice(&0x0001u16.to_be_bytes()); // access_flags
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&descriptor_index.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        }
        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes_count
        out
    }

    #[test]
    fn first_load_is_accepted_with_no_previous_bytecode() {
        let validator = Validator::default();
        let bytecode = build_with_methods("com/example/Widget", &[("doWork", "()V")]);
        let (_, outcome) = validator.validate(None, &bytecode, ValidationMode::Strict, false);
        assert!(matches!(outcome, ValidationOutcome::Accepted { .. }));
    }

    #[test]
    fn method_body_only_change_is_accepted() {
        let validator = Validator::default();
        let before = build_with_methods("com/example/Widget", &[("doWork", "()V")]);
        let after = build_with_methods("com/example/Widget", &[("doWork", "()V")]);
        let (_, outcome) = validator.validate(Some(&before), &after, ValidationMode::Strict, false);
        assert!(matches!(outcome, ValidationOutcome::Accepted { .. }));
    }

    #[test]
    fn added_method_is_rejected_in_strict_mode() {
        let validator = Validator::default();
        let before = build_with_methods("com/example/Widget", &[]);
        let after = build_with_methods("com/example/Widget", &[("newMethod", "()V")]);
        let (_, outcome) = validator.validate(Some(&before), &after, ValidationMode::Strict, true);
        assert!(matches!(outcome, ValidationOutcome::Rejected { .. }));
    }

    #[test]
    fn added_method_is_accepted_in_lenient_mode_when_host_allows_it() {
        let validator = Validator::default();
        let before = build_with_methods("com/example/Widget", &[]);
        let after = build_with_methods("com/example/Widget", &[("newMethod", "()V")]);
        let (_, outcome) = validator.validate(Some(&before), &after, ValidationMode::Lenient, true);
        assert!(matches!(outcome, ValidationOutcome::Accepted { .. }));
    }

    #[test]
    fn malformed_bytecode_is_rejected_not_panicked() {
        let validator = Validator::default();
        let (_, outcome) = validator.validate(None, b"not a class file", ValidationMode::Strict, false);
        match outcome {
            ValidationOutcome::Rejected { violations } => {
                assert!(matches!(violations.as_slice(), [Violation::Malformed { .. }]));
            }
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn revalidating_the_same_digest_is_byte_identical() {
        let validator = Validator::default();
        let before = build_with_methods("com/example/Widget", &[]);
        let after = build_with_methods("com/example/Widget", &[("newMethod", "()V")]);
        let (hash_a, outcome_a) = validator.validate(Some(&before), &after, ValidationMode::Strict, false);
        let (hash_b, outcome_b) = validator.validate(Some(&before), &after, ValidationMode::Strict, false);
        assert_eq!(hash_a, hash_b);
        assert_eq!(outcome_a, outcome_b);
        assert_eq!(validator.cache_len(), 1);
    }
}
