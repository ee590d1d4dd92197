//! Identifier grammar: `cpt-{system}-{kind}-{slug}` and composite
//! `cpt-{system}-{kind}-{slug}-{kind2}-{slug2}`.
//!
//! Systems may contain hyphens. With registered systems the longest matching
//! prefix wins; without them the boundary is inferred from known kind tokens.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const ID_PREFIX: &str = "cpt-";

/// The outer `{kind}-{slug}` of a composite identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedId {
    pub raw: String,
    pub system: String,
    pub kind: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdGrammar {
    /// Registered systems, longest first.
    systems: Vec<String>,
    kinds: BTreeSet<String>,
    nested: BTreeMap<String, BTreeSet<String>>,
}

impl IdGrammar {
    pub fn new(
        systems: impl IntoIterator<Item = String>,
        kinds: impl IntoIterator<Item = String>,
        nested: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        let mut systems: Vec<String> = systems
            .into_iter()
            .filter(|system| !system.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        systems.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            systems,
            kinds: kinds.into_iter().collect(),
            nested,
        }
    }

    pub fn is_kind(&self, token: &str) -> bool {
        self.kinds.contains(token)
    }

    fn is_nested(&self, outer: &str, inner: &str) -> bool {
        self.nested
            .get(outer)
            .is_some_and(|inner_kinds| inner_kinds.contains(inner))
    }

    /// Split a raw identifier into system, kind, and slug.
    ///
    /// Returns `None` for strings without the `cpt-` prefix or with fewer than
    /// three segments after it.
    pub fn parse(&self, raw: &str) -> Option<ParsedId> {
        let rest = raw.strip_prefix(ID_PREFIX)?;
        let tokens: Vec<&str> = rest.split('-').collect();
        if tokens.len() < 3 || tokens.iter().any(|token| token.is_empty()) {
            return None;
        }

        let registered = self.systems.iter().find_map(|system| {
            rest.strip_prefix(system.as_str())
                .and_then(|tail| tail.strip_prefix('-'))
                .filter(|tail| tail.contains('-'))
                .map(|tail| (system.clone(), tail))
        });
        let (system, tail) = match registered {
            Some((system, tail)) => (system, tail.split('-').collect::<Vec<_>>()),
            None => {
                let split = self.infer_system_split(&tokens).unwrap_or(1);
                (tokens[..split].join("-"), tokens[split..].to_vec())
            }
        };

        let kind = tail[0].to_string();
        if tail.len() >= 4 {
            let nested_at = (2..tail.len() - 1)
                .rev()
                .find(|&index| self.is_nested(&kind, tail[index]));
            if let Some(index) = nested_at {
                return Some(ParsedId {
                    raw: raw.to_string(),
                    system,
                    kind: tail[index].to_string(),
                    slug: tail[index + 1..].join("-"),
                    parent: Some(ParentRef {
                        kind,
                        slug: tail[1..index].join("-"),
                    }),
                });
            }
        }
        Some(ParsedId {
            raw: raw.to_string(),
            system,
            kind,
            slug: tail[1..].join("-"),
            parent: None,
        })
    }

    /// Rightmost token index that is a known kind and not the trailing kind
    /// of a composite whose outer kind appears earlier.
    fn infer_system_split(&self, tokens: &[&str]) -> Option<usize> {
        (1..tokens.len() - 1).rev().find(|&index| {
            let token = tokens[index];
            self.is_kind(token)
                && !tokens[1..index]
                    .iter()
                    .any(|outer| self.is_kind(outer) && self.is_nested(outer, token))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar(systems: &[&str]) -> IdGrammar {
        let mut nested = BTreeMap::new();
        nested.insert(
            "feature".to_string(),
            BTreeSet::from(["algo".to_string(), "flow".to_string()]),
        );
        IdGrammar::new(
            systems.iter().map(|s| s.to_string()),
            ["feature", "algo", "flow", "fr"].map(String::from),
            nested,
        )
    }

    #[test]
    fn composite_id_uses_longest_registered_system() {
        let parsed = grammar(&["account", "account-server"])
            .parse("cpt-account-server-feature-billing-algo-calc")
            .unwrap();
        assert_eq!(parsed.system, "account-server");
        assert_eq!(parsed.kind, "algo");
        assert_eq!(parsed.slug, "calc");
        assert_eq!(
            parsed.parent,
            Some(ParentRef {
                kind: "feature".to_string(),
                slug: "billing".to_string()
            })
        );
    }

    #[test]
    fn shorter_registered_system_still_resolves() {
        let parsed = grammar(&["account", "account-server"])
            .parse("cpt-account-fr-login-flow")
            .unwrap();
        assert_eq!(parsed.system, "account");
        assert_eq!(parsed.kind, "fr");
        assert_eq!(parsed.slug, "login-flow");
        assert_eq!(parsed.parent, None);
    }

    #[test]
    fn system_is_inferred_from_kind_tokens_without_registry() {
        let grammar = grammar(&[]);
        let parsed = grammar.parse("cpt-account-server-fr-login").unwrap();
        assert_eq!(parsed.system, "account-server");
        assert_eq!(parsed.kind, "fr");

        let composite = grammar
            .parse("cpt-account-server-feature-billing-algo-calc")
            .unwrap();
        assert_eq!(composite.system, "account-server");
        assert_eq!(composite.kind, "algo");
    }

    #[test]
    fn unknown_kinds_fall_back_to_second_token() {
        let parsed = grammar(&[]).parse("cpt-app-widget-thing").unwrap();
        assert_eq!(parsed.system, "app");
        assert_eq!(parsed.kind, "widget");
        assert_eq!(parsed.slug, "thing");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let grammar = grammar(&[]);
        assert!(grammar.parse("app-fr-login").is_none());
        assert!(grammar.parse("cpt-app-fr").is_none());
        assert!(grammar.parse("cpt-app--login").is_none());
    }
}
