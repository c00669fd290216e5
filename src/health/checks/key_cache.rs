//! Merged cache check

use std::collections::HashSet;

use crate::health::check::{CheckResult, SystemCheck};
use crate::input::{Handler, InputStack, KeyCode};

/// Checks the stack's merged key list and cursor against its handlers
pub struct KeyCacheCheck<'a> {
    stack: &'a InputStack,
}

impl<'a> KeyCacheCheck<'a> {
    pub fn new(stack: &'a InputStack) -> Self {
        Self { stack }
    }
}

impl SystemCheck for KeyCacheCheck<'_> {
    fn name(&self) -> &'static str {
        "Key Cache"
    }

    fn description(&self) -> Option<&'static str> {
        Some("Validates merged keys, axes and cursor against stacked handlers")
    }

    fn check(&self) -> CheckResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let dirty: Vec<&str> = self
            .stack
            .iter()
            .filter(|h| h.is_dirty())
            .map(Handler::name)
            .collect();
        if !dirty.is_empty() {
            // Caches refresh on the next dispatch
            warnings.push(format!("pending refresh for {}", dirty.join(", ")));
        }

        let cached = self.stack.key_codes();
        let unique: HashSet<KeyCode> = cached.iter().copied().collect();
        if unique.len() != cached.len() {
            errors.push("merged key list polls a key more than once".to_string());
        }

        if dirty.is_empty() {
            let expected: HashSet<KeyCode> = self
                .stack
                .iter()
                .flat_map(|h| h.all_key_codes())
                .collect();
            for key in expected.difference(&unique) {
                errors.push(format!("{key} is bound but never polled"));
            }
            for key in unique.difference(&expected) {
                warnings.push(format!("{key} is polled but no stacked handler binds it"));
            }
        }

        if let Some(top) = self.stack.top()
            && top.policy().cursor != self.stack.cursor()
        {
            errors.push(format!(
                "cursor is {:?} but '{}' on top wants {:?}",
                self.stack.cursor(),
                top.name(),
                top.policy().cursor
            ));
        }

        CheckResult::from_findings(
            format!(
                "{} keys polled, {} axes visible",
                cached.len(),
                self.stack.axes().count()
            ),
            &errors,
            &warnings,
        )
    }
}
