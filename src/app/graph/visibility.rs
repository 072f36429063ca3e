use std::collections::BTreeSet;

use crate::model::{Category, Connection, GraphModel, Node, TagId};

/// Active category and tag selection.
///
/// An empty category set is legal and filters every node out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterState {
    categories: BTreeSet<Category>,
    tags: BTreeSet<TagId>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            categories: Category::ALL.into_iter().collect(),
            tags: BTreeSet::new(),
        }
    }
}

impl FilterState {
    pub fn with_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        Self {
            categories: categories.into_iter().collect(),
            tags: BTreeSet::new(),
        }
    }

    pub fn categories(&self) -> &BTreeSet<Category> {
        &self.categories
    }

    pub fn tags(&self) -> &BTreeSet<TagId> {
        &self.tags
    }

    pub fn is_category_active(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub fn all_categories_active(&self) -> bool {
        self.categories.len() == Category::ALL.len()
    }

    pub fn set_category(&mut self, category: Category, active: bool) {
        if active {
            self.categories.insert(category);
        } else {
            self.categories.remove(&category);
        }
    }

    pub fn set_all_categories(&mut self, active: bool) {
        self.categories = if active {
            Category::ALL.into_iter().collect()
        } else {
            BTreeSet::new()
        };
    }

    pub fn is_tag_active(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn set_tag(&mut self, tag: &str, active: bool) {
        if active {
            self.tags.insert(tag.to_owned());
        } else {
            self.tags.remove(tag);
        }
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    fn admits(&self, node: &Node) -> bool {
        self.categories.contains(&node.category)
            && (self.tags.is_empty() || self.tags.iter().any(|tag| node.has_tag(tag)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    /// Only used for connections with exactly one filtered-out endpoint.
    Dimmed,
    Hidden,
}

/// Read-only view of which nodes and connections pass the current filter.
#[derive(Clone, Debug, Default)]
pub struct VisibilityFilter {
    state: FilterState,
}

impl VisibilityFilter {
    pub fn new(state: FilterState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    pub fn node(&self, node: &Node) -> Visibility {
        if self.state.admits(node) {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    /// Dangling connections are hidden.
    pub fn connection(&self, model: &GraphModel, connection: &Connection) -> Visibility {
        let (Some(source), Some(target)) =
            (model.node(&connection.source), model.node(&connection.target))
        else {
            return Visibility::Hidden;
        };

        match (self.state.admits(source), self.state.admits(target)) {
            (true, true) => Visibility::Visible,
            (false, false) => Visibility::Hidden,
            _ => Visibility::Dimmed,
        }
    }
}
