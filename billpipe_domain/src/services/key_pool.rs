// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # API Key Pool
//!
//! Deterministic rotation over the ordered list of LLM API keys a secret
//! store hands back (spec §2 item 1, §5 "Shared-resource policy"). Each
//! processor fetches the list once on cold start and rotates by attempt
//! number modulo pool size — there is no cross-invocation coordination, so
//! two concurrent invocations may pick the same key; rate-limit retries
//! absorb the resulting collisions.

use crate::error::PipelineError;

/// An ordered, non-empty list of API keys, rotated deterministically.
#[derive(Debug, Clone)]
pub struct KeyPool {
    keys: Vec<String>,
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> Result<Self, PipelineError> {
        if keys.is_empty() {
            return Err(PipelineError::Configuration("key pool must not be empty".to_string()));
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key for a given attempt number (0-based), chosen by round-robin
    /// modulo pool size.
    pub fn key_for_attempt(&self, attempt: u32) -> &str {
        &self.keys[(attempt as usize) % self.keys.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_round_robin_by_attempt() {
        let pool = KeyPool::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        assert_eq!(pool.key_for_attempt(0), "a");
        assert_eq!(pool.key_for_attempt(1), "b");
        assert_eq!(pool.key_for_attempt(2), "c");
        assert_eq!(pool.key_for_attempt(3), "a");
    }

    #[test]
    fn single_key_pool_always_returns_it() {
        let pool = KeyPool::new(vec!["only".into()]).unwrap();
        assert_eq!(pool.key_for_attempt(0), "only");
        assert_eq!(pool.key_for_attempt(7), "only");
    }

    #[test]
    fn empty_pool_is_a_configuration_error() {
        assert!(KeyPool::new(vec![]).is_err());
    }
}
