//! Category manager: interchangeable clusters of catalog categories across
//! candidate layouts.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use u_layout_core::LayoutJson;

/// Whether a group may still be offered during completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    Free,
    Used,
}

/// A cluster of categories that are offered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub status: CategoryStatus,
    pub ids: Vec<String>,
}

impl CategoryGroup {
    pub fn is_free(&self) -> bool {
        self.status == CategoryStatus::Free
    }
}

/// Tracks category groups of one session's candidate layouts.
///
/// Traversal with [`next`](Self::next) and [`prev`](Self::prev) visits every
/// group regardless of status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryManager {
    groups: Vec<CategoryGroup>,
    cursor: usize,
    /// False until the cursor first lands on a group.
    visited: bool,
}

impl CategoryManager {
    /// Partitions the categories of `layouts` into disjoint groups: each
    /// item contributes the categories no earlier item claimed.
    pub fn from_layouts<'a>(layouts: impl IntoIterator<Item = &'a LayoutJson>) -> Self {
        let mut assigned: HashSet<String> = HashSet::new();
        let mut groups = Vec::new();
        for layout in layouts {
            for dump in &layout.content_dumps {
                let mut ids = Vec::new();
                for cat in &dump.categories {
                    if assigned.insert(cat.clone()) {
                        ids.push(cat.clone());
                    }
                }
                if !ids.is_empty() {
                    groups.push(CategoryGroup {
                        status: CategoryStatus::Free,
                        ids,
                    });
                }
            }
        }
        Self {
            groups,
            cursor: 0,
            visited: false,
        }
    }

    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Index of the current group.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&CategoryGroup> {
        self.groups.get(self.cursor)
    }

    /// Advances to the next group, wrapping around.
    pub fn next(&mut self) -> Option<&CategoryGroup> {
        if self.groups.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.groups.len();
        self.visited = true;
        self.current()
    }

    /// Steps back to the previous group, wrapping around.
    pub fn prev(&mut self) -> Option<&CategoryGroup> {
        if self.groups.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + self.groups.len() - 1) % self.groups.len();
        self.visited = true;
        self.current()
    }

    /// Advances to the next free group after the cursor. Before any group
    /// was visited the search starts at the cursor itself.
    pub fn next_free(&mut self) -> Option<&CategoryGroup> {
        let n = self.groups.len();
        let first = usize::from(self.visited);
        let offset = (first..first + n).find(|k| self.groups[(self.cursor + k) % n].is_free())?;
        self.cursor = (self.cursor + offset) % n;
        self.visited = true;
        self.current()
    }

    /// Marks the current group as used.
    pub fn occupy(&mut self) {
        if let Some(group) = self.groups.get_mut(self.cursor) {
            group.status = CategoryStatus::Used;
            self.visited = true;
        }
    }

    /// Marks every group sharing a category with `categories` as used.
    pub fn occupy_categories(&mut self, categories: &[String]) {
        let set: HashSet<&str> = categories.iter().map(String::as_str).collect();
        for group in &mut self.groups {
            if group.ids.iter().any(|id| set.contains(id.as_str())) {
                group.status = CategoryStatus::Used;
            }
        }
    }

    /// Frees exactly the groups whose ids are all in `categories`.
    pub fn release(&mut self, categories: &[String]) {
        let set: HashSet<&str> = categories.iter().map(String::as_str).collect();
        for group in &mut self.groups {
            if group.ids.iter().all(|id| set.contains(id.as_str())) {
                group.status = CategoryStatus::Free;
            }
        }
    }

    /// Categories of every free group.
    pub fn rest(&self) -> Vec<String> {
        self.groups
            .iter()
            .filter(|g| g.is_free())
            .flat_map(|g| g.ids.iter().cloned())
            .collect()
    }

    /// Returns true when every category of `ids` is free.
    pub fn all_free(&self, ids: &[String]) -> bool {
        ids.iter().all(|id| self.is_free(id))
    }

    /// Returns false when `category` belongs to a used group. Categories
    /// outside every group count as free.
    pub fn is_free(&self, category: &str) -> bool {
        !self
            .groups
            .iter()
            .any(|g| !g.is_free() && g.ids.iter().any(|id| id == category))
    }
}
