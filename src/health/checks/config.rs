//! Configuration system health check

use crate::config::AppConfig;
use crate::health::check::{CheckResult, SystemCheck};

/// Checks that configuration can be loaded for all profiles
pub struct ConfigCheck {
    profiles: Vec<&'static str>,
}

impl ConfigCheck {
    /// Creates a new config check with default profiles
    pub fn new() -> Self {
        Self {
            profiles: vec!["debug", "release"],
        }
    }
}

impl Default for ConfigCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCheck for ConfigCheck {
    fn name(&self) -> &'static str {
        "Configuration"
    }

    fn description(&self) -> Option<&'static str> {
        Some("Validates handler profiles loading from files and environment")
    }

    fn check(&self) -> CheckResult {
        let mut details = Vec::new();
        let mut all_success = true;
        let mut has_warnings = false;

        // Test loading each profile
        for profile in &self.profiles {
            match AppConfig::load(profile) {
                Ok(config) => {
                    let (line, ok) = describe_profile(profile, &config);
                    details.push(line);
                    all_success &= ok;
                }
                Err(e) => {
                    details.push(format!("  ✗ Profile '{}': failed to load - {}", profile, e));
                    all_success = false;
                }
            }
        }

        // Test loading from environment
        match AppConfig::load_from_env() {
            Ok(config) => {
                details.push(format!(
                    "  ✓ Environment config: profile '{}' loaded",
                    config.profile
                ));
            }
            Err(e) => {
                details.push(format!("  ⚠ Environment config: {}", e));
                has_warnings = true;
            }
        }

        let details_str = details.join("\n");

        if !all_success {
            CheckResult::fail("One or more config profiles are invalid")
                .with_details(details_str)
        } else if has_warnings {
            CheckResult::warn("Config loaded with warnings").with_details(details_str)
        } else {
            CheckResult::pass(format!("{} profiles validated", self.profiles.len()))
                .with_details(details_str)
        }
    }
}

/// One detail line for a loaded profile; false if its handler names repeat
fn describe_profile(profile: &str, config: &AppConfig) -> (String, bool) {
    let mut names: Vec<&str> = config.handlers.iter().map(|h| h.name.as_str()).collect();
    names.sort_unstable();
    let duplicate = names.windows(2).find(|pair| pair[0] == pair[1]).map(|pair| pair[0]);

    match duplicate {
        Some(name) => (
            format!("  ✗ Profile '{profile}': handler '{name}' defined more than once"),
            false,
        ),
        None => (
            format!(
                "  ✓ Profile '{}': loaded successfully ({} handlers, remap timeout: {})",
                profile,
                config.handlers.len(),
                config
                    .remap
                    .timeout_frames
                    .map_or_else(|| "none".to_string(), |frames| format!("{frames} frames"))
            ),
            true,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::HandlerTemplate;

    #[test]
    fn test_duplicate_handler_names_fail_the_profile() {
        let mut config = AppConfig::default();
        config.handlers = vec![HandlerTemplate::new("Menu"), HandlerTemplate::new("Menu")];
        let (line, ok) = describe_profile("test", &config);
        assert!(!ok);
        assert!(line.contains("'Menu'"));
    }
}
