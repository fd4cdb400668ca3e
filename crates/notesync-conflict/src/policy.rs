//! Policy engine for automatic conflict resolution
//!
//! Evaluates conflict rules from configuration to pick a resolution when the
//! decision callback gives no answer. Rules are glob patterns over the local
//! path, matched in first-match-wins order; the default policy applies when
//! no rule matches.

use glob::Pattern;
use tracing::{debug, trace, warn};

use notesync_core::config::{ConflictRuleConfig, ConflictsConfig};
use notesync_core::domain::{ConflictResolution, SyncPath};

use crate::error::ConflictError;

/// Used when the configured default is not a concrete policy
const FALLBACK_POLICY: ConflictResolution = ConflictResolution::Skip;

fn compile(rule: &ConflictRuleConfig) -> Result<(Pattern, ConflictResolution), ConflictError> {
    let pattern = Pattern::new(&rule.pattern).map_err(|e| ConflictError::InvalidRule {
        pattern: rule.pattern.clone(),
        reason: e.to_string(),
    })?;
    if !rule.resolution.is_decided() {
        return Err(ConflictError::InvalidRule {
            pattern: rule.pattern.clone(),
            reason: format!("'{}' is not a concrete resolution", rule.resolution),
        });
    }
    Ok((pattern, rule.resolution))
}

/// Engine that evaluates conflict resolution rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, ConflictResolution)>,
    default_policy: ConflictResolution,
}

impl PolicyEngine {
    /// Compile `rules`; invalid rules are logged and skipped
    pub fn new(default_policy: ConflictResolution, rules: &[ConflictRuleConfig]) -> Self {
        let default_policy = if default_policy.is_decided() {
            default_policy
        } else {
            warn!(
                configured = %default_policy,
                fallback = %FALLBACK_POLICY,
                "Default conflict policy must be concrete, using fallback"
            );
            FALLBACK_POLICY
        };

        let rules: Vec<_> = rules
            .iter()
            .filter_map(|rule| match compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(error = %e, "Skipping invalid conflict rule");
                    None
                }
            })
            .collect();

        debug!(
            rules_count = rules.len(),
            default = %default_policy,
            "PolicyEngine initialized"
        );

        Self {
            rules,
            default_policy,
        }
    }

    pub fn from_config(config: &ConflictsConfig) -> Self {
        Self::new(config.default_policy, &config.rules)
    }

    /// Check every rule, reporting the first invalid one
    pub fn validate_rules(rules: &[ConflictRuleConfig]) -> Result<(), ConflictError> {
        rules.iter().try_for_each(|rule| compile(rule).map(|_| ()))
    }

    /// Resolution for a conflict on `path`
    pub fn evaluate(&self, path: &SyncPath) -> ConflictResolution {
        let candidate = path.to_string();
        for (pattern, resolution) in &self.rules {
            if pattern.matches(&candidate) {
                trace!(
                    path = %candidate,
                    pattern = %pattern,
                    resolution = %resolution,
                    "Conflict rule matched"
                );
                return *resolution;
            }
        }

        trace!(
            path = %candidate,
            default = %self.default_policy,
            "No conflict rule matched, using default"
        );
        self.default_policy
    }

    pub fn default_policy(&self) -> ConflictResolution {
        self.default_policy
    }

    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::from_config(&ConflictsConfig::default())
    }
}
