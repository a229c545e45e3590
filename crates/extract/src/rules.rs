//! Item-to-item rule table and the registry of named reference finders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use u_layout_core::{ConstraintKind, ItemConstraintObject};

/// Name of the built-in finder that picks the closest candidate.
pub const NEAREST_FINDER: &str = "nearest";

/// One item-to-item rule: items of `item_type` are anchored to an item of
/// `ref_item_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRule {
    pub id: String,
    pub item_type: String,
    pub ref_item_type: String,
    pub kind: ConstraintKind,
    /// Finder used when several references qualify.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finder: Option<String>,
}

impl ItemRule {
    pub fn new(id: &str, item_type: &str, ref_item_type: &str) -> Self {
        Self {
            id: id.to_string(),
            item_type: item_type.to_string(),
            ref_item_type: ref_item_type.to_string(),
            kind: ConstraintKind::DistanceAsIs,
            finder: None,
        }
    }

    pub fn with_finder(mut self, finder: &str) -> Self {
        self.finder = Some(finder.to_string());
        self
    }

    /// Returns true when `item` is a subject of this rule.
    pub fn applies_to(&self, item: &ItemConstraintObject) -> bool {
        item.content_type().is_type_of(&self.item_type)
    }

    /// Returns true when `item` can serve as this rule's reference.
    pub fn is_reference(&self, item: &ItemConstraintObject) -> bool {
        item.content_type().is_type_of(&self.ref_item_type)
    }
}

/// Rules of the `Bed` region, in priority order.
pub fn bed_rules() -> Vec<ItemRule> {
    vec![
        ItemRule::new("nightstand-bed", "nightstand", "bed").with_finder(NEAREST_FINDER),
        ItemRule::new("bedbench-bed", "bedbench", "bed").with_finder(NEAREST_FINDER),
        ItemRule::new("rug-bed", "rug", "bed").with_finder(NEAREST_FINDER),
        ItemRule::new("pendant-bed", "pendant", "bed").with_finder(NEAREST_FINDER),
    ]
}

/// Selects one candidate (by index) for `item`.
pub type FinderFn = fn(&ItemConstraintObject, &[&ItemConstraintObject]) -> Option<usize>;

/// Named reference finders.
#[derive(Clone)]
pub struct FinderRegistry {
    finders: HashMap<String, FinderFn>,
}

impl std::fmt::Debug for FinderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.finders.keys().collect();
        names.sort();
        f.debug_struct("FinderRegistry").field("finders", &names).finish()
    }
}

impl Default for FinderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(NEAREST_FINDER, nearest);
        registry
    }
}

impl FinderRegistry {
    /// A registry without any finders.
    pub fn empty() -> Self {
        Self {
            finders: HashMap::new(),
        }
    }

    /// Registers (or replaces) a finder.
    pub fn register(&mut self, name: &str, finder: FinderFn) {
        self.finders.insert(name.to_string(), finder);
    }

    pub fn get(&self, name: &str) -> Option<FinderFn> {
        self.finders.get(name).copied()
    }

    /// Picks a reference for `item` among `candidates` according to `rule`.
    ///
    /// A single candidate is used directly; otherwise the rule's finder
    /// decides, falling back to the first candidate.
    pub fn select<'a>(
        &self,
        rule: &ItemRule,
        item: &ItemConstraintObject,
        candidates: &[&'a ItemConstraintObject],
    ) -> Option<&'a ItemConstraintObject> {
        match candidates.len() {
            0 => None,
            1 => Some(candidates[0]),
            _ => {
                let index = match rule.finder.as_deref() {
                    Some(name) => match self.get(name) {
                        Some(finder) => finder(item, candidates),
                        None => {
                            log::warn!(
                                "rule '{}' names unknown finder '{}', using first candidate",
                                rule.id,
                                name
                            );
                            Some(0)
                        }
                    },
                    None => Some(0),
                };
                index.and_then(|i| candidates.get(i).copied())
            }
        }
    }
}

/// Picks the candidate whose position is closest to the item's.
pub fn nearest(item: &ItemConstraintObject, candidates: &[&ItemConstraintObject]) -> Option<usize> {
    let origin = item.dump.frame().position();
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, (c.dump.frame().position() - origin).norm()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
