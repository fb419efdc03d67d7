// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use stowage_core::asset::{AssetId, BundleName, ResourceKind};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// File suffix appended to every generated bundle name.
pub const BUNDLE_SUFFIX: &str = ".ab";

/// Which kind of asset a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    /// Only assets selected explicitly as seeds. Such rules also collect seeds.
    #[default]
    Direct,
    /// Only assets pulled in as dependencies.
    Dependency,
    /// Both. Such rules also collect seeds.
    Any,
}

impl RuleTarget {
    /// Returns `true` if an asset of `kind` falls under this target.
    pub fn accepts(self, kind: ResourceKind) -> bool {
        match self {
            RuleTarget::Direct => kind == ResourceKind::Direct,
            RuleTarget::Dependency => kind == ResourceKind::Dependency,
            RuleTarget::Any => true,
        }
    }

    fn collects_seeds(self) -> bool {
        self != RuleTarget::Dependency
    }
}

/// How assets matched by a rule are grouped into bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleGranularity {
    /// One bundle per asset.
    #[default]
    File,
    /// One bundle per directory containing matched assets.
    Directory,
    /// One bundle for everything under the rule's scope.
    All,
}

/// A single packaging rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackRule {
    /// Path scope (a directory or a single file) the rule covers.
    pub scope: String,
    /// Which kind of asset the rule applies to.
    #[serde(default)]
    pub target: RuleTarget,
    /// How matched assets are grouped.
    #[serde(default)]
    pub granularity: BundleGranularity,
    /// Accepted file suffixes (e.g. `".prefab"`). Empty accepts every file.
    #[serde(default)]
    pub suffixes: Vec<String>,
}

impl PackRule {
    /// Creates a rule with no suffix filter.
    pub fn new(
        scope: impl Into<String>,
        target: RuleTarget,
        granularity: BundleGranularity,
    ) -> Self {
        Self {
            scope: scope.into(),
            target,
            granularity,
            suffixes: Vec::new(),
        }
    }

    /// Restricts the rule to the given suffixes.
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    fn covers(&self, asset: &AssetId) -> bool {
        asset.is_within(&self.scope)
    }

    fn accepts_suffix(&self, asset: &AssetId) -> bool {
        self.suffixes.is_empty()
            || self
                .suffixes
                .iter()
                .any(|suffix| asset.as_str().ends_with(suffix.as_str()))
    }

    fn depth(&self) -> usize {
        self.scope.split('/').filter(|part| !part.is_empty()).count()
    }

    /// Name of the bundle `asset` goes into under this rule.
    pub fn bundle_name(&self, asset: &AssetId) -> BundleName {
        let stem = match self.granularity {
            BundleGranularity::File => asset.as_str(),
            BundleGranularity::Directory => match asset.directory() {
                "" => self.scope.as_str(),
                dir => dir,
            },
            BundleGranularity::All => self.scope.as_str(),
        };
        BundleName::new(format!("{}{BUNDLE_SUFFIX}", stem.to_lowercase()))
    }
}

/// One problem found while validating a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// Two rules share a scope.
    #[error("more than one rule is registered for '{scope}'")]
    DuplicateScope {
        /// The repeated scope.
        scope: String,
    },
    /// A `Directory` or `All` rule names a directory that does not exist.
    #[error("rule scope '{scope}' does not exist")]
    MissingScope {
        /// The missing scope.
        scope: String,
    },
    /// A rule has an empty scope.
    #[error("rule #{index} has an empty scope")]
    EmptyScope {
        /// Position of the rule in declaration order.
        index: usize,
    },
}

/// The rule set failed validation. Every problem is listed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid packaging rules ({} problem(s)):{}", .0.len(), list_violations(.0))]
pub struct RuleError(pub Vec<RuleViolation>);

fn list_violations(violations: &[RuleViolation]) -> String {
    violations.iter().map(|v| format!("\n  - {v}")).collect()
}

/// A validated set of packaging rules.
///
/// When several rules cover an asset, the one with the longest scope wins.
/// Scopes are compared by whole path components, so two distinct scopes that
/// both cover an asset are always nested and never tie.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PackRule>,
}

impl RuleSet {
    /// Validates `rules`.
    ///
    /// `scope_exists` is asked whether the directory scope of each `Directory`
    /// or `All` rule exists on disk.
    pub fn new(
        rules: Vec<PackRule>,
        scope_exists: impl Fn(&str) -> bool,
    ) -> Result<Self, RuleError> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        let mut normalised = Vec::with_capacity(rules.len());

        for (index, mut rule) in rules.into_iter().enumerate() {
            rule.scope = rule.scope.replace('\\', "/").trim_end_matches('/').to_string();
            if rule.scope.is_empty() {
                violations.push(RuleViolation::EmptyScope { index });
                continue;
            }
            if !seen.insert(rule.scope.clone()) {
                violations.push(RuleViolation::DuplicateScope {
                    scope: rule.scope.clone(),
                });
            }
            if matches!(
                rule.granularity,
                BundleGranularity::Directory | BundleGranularity::All
            ) && !scope_exists(&rule.scope)
            {
                violations.push(RuleViolation::MissingScope {
                    scope: rule.scope.clone(),
                });
            }
            normalised.push(rule);
        }

        if !violations.is_empty() {
            return Err(RuleError(violations));
        }
        Ok(Self { rules: normalised })
    }

    /// The rules, in declaration order.
    pub fn rules(&self) -> &[PackRule] {
        &self.rules
    }

    /// The rule that decides where `asset` goes, if any.
    pub fn matching_rule(&self, asset: &AssetId, kind: ResourceKind) -> Option<&PackRule> {
        self.rules
            .iter()
            .filter(|rule| rule.covers(asset) && rule.target.accepts(kind) && rule.accepts_suffix(asset))
            .max_by_key(|rule| rule.depth())
    }

    /// The bundle `asset` goes into, or `None` if no rule matches.
    pub fn bundle_for(&self, asset: &AssetId, kind: ResourceKind) -> Option<BundleName> {
        self.matching_rule(asset, kind)
            .map(|rule| rule.bundle_name(asset))
    }

    /// Picks the seed assets out of `candidates`.
    ///
    /// A candidate is decided by the most specific seed-collecting rule whose
    /// scope covers it, and becomes a seed if that rule accepts its suffix.
    pub fn collect_seeds<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a AssetId>,
    ) -> BTreeSet<AssetId> {
        candidates
            .into_iter()
            .filter(|candidate| {
                self.rules
                    .iter()
                    .filter(|rule| rule.target.collects_seeds() && rule.covers(candidate))
                    .max_by_key(|rule| rule.depth())
                    .is_some_and(|rule| rule.accepts_suffix(candidate))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AssetId {
        AssetId::new(s)
    }

    fn anything_exists(_: &str) -> bool {
        true
    }

    #[test]
    fn test_bundle_names_per_granularity() {
        let file = PackRule::new("Assets/UI", RuleTarget::Direct, BundleGranularity::File);
        let dir = PackRule::new("Assets/UI", RuleTarget::Direct, BundleGranularity::Directory);
        let all = PackRule::new("Assets/UI", RuleTarget::Direct, BundleGranularity::All);
        let asset = id("Assets/UI/Menus/Main.prefab");

        assert_eq!(file.bundle_name(&asset).as_str(), "assets/ui/menus/main.prefab.ab");
        assert_eq!(dir.bundle_name(&asset).as_str(), "assets/ui/menus.ab");
        assert_eq!(all.bundle_name(&asset).as_str(), "assets/ui.ab");
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let rules = vec![
            PackRule::new("assets/ui", RuleTarget::Direct, BundleGranularity::All),
            PackRule::new("assets/ui/", RuleTarget::Any, BundleGranularity::File),
            PackRule::new("", RuleTarget::Direct, BundleGranularity::File),
            PackRule::new("assets/missing", RuleTarget::Direct, BundleGranularity::Directory),
            PackRule::new("assets/missing-file.png", RuleTarget::Direct, BundleGranularity::File),
        ];
        let err = RuleSet::new(rules, |scope| scope == "assets/ui").unwrap_err();

        assert_eq!(
            err.0,
            vec![
                RuleViolation::DuplicateScope {
                    scope: "assets/ui".to_string()
                },
                RuleViolation::EmptyScope { index: 2 },
                RuleViolation::MissingScope {
                    scope: "assets/missing".to_string()
                },
            ]
        );
        assert!(err.to_string().contains("3 problem(s)"));
    }

    #[test]
    fn test_longest_scope_wins() {
        let rules = RuleSet::new(
            vec![
                PackRule::new("assets", RuleTarget::Any, BundleGranularity::All),
                PackRule::new("assets/ui", RuleTarget::Any, BundleGranularity::Directory),
                PackRule::new("assets/ui/icons/logo.png", RuleTarget::Any, BundleGranularity::File),
            ],
            anything_exists,
        )
        .unwrap();

        let bundle = |path: &str| {
            rules
                .bundle_for(&id(path), ResourceKind::Dependency)
                .map(|name| name.as_str().to_string())
        };
        assert_eq!(bundle("assets/ui/icons/logo.png").as_deref(), Some("assets/ui/icons/logo.png.ab"));
        assert_eq!(bundle("assets/ui/icons/other.png").as_deref(), Some("assets/ui/icons.ab"));
        assert_eq!(bundle("assets/uix/a.png").as_deref(), Some("assets.ab"));
        assert_eq!(bundle("other/a.png"), None);
    }

    #[test]
    fn test_target_and_suffix_filter_before_precedence() {
        let rules = RuleSet::new(
            vec![
                PackRule::new("assets", RuleTarget::Dependency, BundleGranularity::All),
                PackRule::new("assets/ui", RuleTarget::Direct, BundleGranularity::File)
                    .with_suffixes([".prefab"]),
            ],
            anything_exists,
        )
        .unwrap();

        // The inner rule only takes direct prefabs.
        assert_eq!(
            rules.bundle_for(&id("assets/ui/a.png"), ResourceKind::Dependency),
            Some(BundleName::new("assets.ab"))
        );
        assert_eq!(rules.bundle_for(&id("assets/ui/a.png"), ResourceKind::Direct), None);
        assert_eq!(
            rules.bundle_for(&id("assets/ui/a.prefab"), ResourceKind::Direct),
            Some(BundleName::new("assets/ui/a.prefab.ab"))
        );
    }

    #[test]
    fn test_inner_scope_decides_seed_collection() {
        let rules = RuleSet::new(
            vec![
                PackRule::new("assets", RuleTarget::Direct, BundleGranularity::All)
                    .with_suffixes([".prefab", ".png"]),
                PackRule::new("assets/ui", RuleTarget::Direct, BundleGranularity::File)
                    .with_suffixes([".prefab"]),
                PackRule::new("assets/shared", RuleTarget::Dependency, BundleGranularity::All),
            ],
            anything_exists,
        )
        .unwrap();

        let candidates = [
            id("assets/level.prefab"),
            id("assets/ui/root.prefab"),
            id("assets/ui/atlas.png"),
            id("assets/shared/common.png"),
            id("assets/readme.txt"),
            id("elsewhere/x.prefab"),
        ];
        let seeds = rules.collect_seeds(&candidates);

        assert_eq!(
            seeds.into_iter().collect::<Vec<_>>(),
            vec![
                id("assets/level.prefab"),
                id("assets/shared/common.png"),
                id("assets/ui/root.prefab"),
            ]
        );
    }
}
