//! Stack membership check

use std::collections::HashSet;

use crate::health::check::{CheckResult, SystemCheck};
use crate::input::InputStack;

/// Checks that every stacked handler is registered, initialized and stacked once
pub struct StackCheck<'a> {
    stack: &'a InputStack,
}

impl<'a> StackCheck<'a> {
    pub fn new(stack: &'a InputStack) -> Self {
        Self { stack }
    }
}

impl SystemCheck for StackCheck<'_> {
    fn name(&self) -> &'static str {
        "Stack"
    }

    fn description(&self) -> Option<&'static str> {
        Some("Validates stack entries against the handler registry")
    }

    fn check(&self) -> CheckResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut seen = HashSet::new();
        let mut stacked = 0;
        for handler in self.stack.iter() {
            stacked += 1;
            if !seen.insert(handler.name()) {
                errors.push(format!("'{}' is stacked more than once", handler.name()));
            }
            if !handler.is_initialized() {
                errors.push(format!("'{}' is stacked but not initialized", handler.name()));
            }
        }
        if stacked != self.stack.depth() {
            errors.push(format!(
                "{} stack entries have no registered handler",
                self.stack.depth() - stacked
            ));
        }

        for handler in self.stack.registry().iter() {
            if !handler.is_initialized() {
                warnings.push(format!("'{}' is registered but not initialized", handler.name()));
            }
        }
        if self.stack.is_empty() {
            warnings.push("stack is empty, no input will be dispatched".to_string());
        }

        let mut result = CheckResult::from_findings(
            format!(
                "{} of {} handlers stacked",
                self.stack.depth(),
                self.stack.registry().len()
            ),
            &errors,
            &warnings,
        );
        let listing = self.stack.debug_stack();
        if !listing.is_empty() {
            let details = match result.details.take() {
                Some(findings) => format!("{findings}\n{listing}"),
                None => listing,
            };
            result = result.with_details(details);
        }
        result
    }
}
