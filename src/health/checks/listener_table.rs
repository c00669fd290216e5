//! Key table consistency check

use crate::health::check::{CheckResult, SystemCheck};
use crate::input::{InputStack, KeyEvent};

/// Checks every registered handler's key tables
///
/// A slot must point at a listener that is bound to that key. A bound key
/// held by another listener means this one lost a collision when it was
/// loaded and will never fire on that key. Unsubscribed listeners leave
/// their keys unslotted and are not reported.
pub struct ListenerTableCheck<'a> {
    stack: &'a InputStack,
}

impl<'a> ListenerTableCheck<'a> {
    pub fn new(stack: &'a InputStack) -> Self {
        Self { stack }
    }
}

impl SystemCheck for ListenerTableCheck<'_> {
    fn name(&self) -> &'static str {
        "Listener Tables"
    }

    fn description(&self) -> Option<&'static str> {
        Some("Validates key slots against listener bindings")
    }

    fn check(&self) -> CheckResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut listeners = 0;

        for handler in self.stack.registry().iter() {
            for event in KeyEvent::ALL {
                for (key, listener) in handler.slots(event) {
                    if listener.slot_of(key).is_none() {
                        errors.push(format!(
                            "{}/{:?}: '{}' sits under {} but is not bound to it",
                            handler.name(),
                            event,
                            listener.name(),
                            key
                        ));
                    }
                }

                for listener in handler.listeners(event) {
                    listeners += 1;
                    for key in listener.keys() {
                        let owner = handler.listener(event, key).map(|l| l.name());
                        if owner.is_none() && !listener.has_callbacks() {
                            continue;
                        }
                        if owner != Some(listener.name()) {
                            warnings.push(format!(
                                "{}/{:?}: '{}' is bound to {} but {} holds that key",
                                handler.name(),
                                event,
                                listener.name(),
                                key,
                                owner.unwrap_or("nobody")
                            ));
                        }
                    }
                }
            }
        }

        CheckResult::from_findings(
            format!(
                "{} listeners across {} handlers",
                listeners,
                self.stack.registry().len()
            ),
            &errors,
            &warnings,
        )
    }
}
