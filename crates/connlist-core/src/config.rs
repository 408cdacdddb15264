// ── Projection configuration ──
//
// Describes *what* a projection tracks and how it is ordered. Built by
// the caller (CLI, config file) and handed in; core never reads files.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::Service;
use crate::ordering::SortPolicy;

/// Which services of a technology a projection keeps.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceFilter {
    #[default]
    All,
    #[strum(to_string = "saved_only", serialize = "saved")]
    SavedOnly,
    #[strum(to_string = "available_only", serialize = "available")]
    AvailableOnly,
}

impl ServiceFilter {
    pub fn matches(&self, service: &Service) -> bool {
        match self {
            Self::All => true,
            Self::SavedOnly => service.saved,
            Self::AvailableOnly => service.available,
        }
    }
}

/// The backend query a projection issues on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Technology category; empty means every technology.
    pub technology: String,
    pub filter: ServiceFilter,
}

impl Scope {
    pub fn matches(&self, service: &Service) -> bool {
        (self.technology.is_empty() || service.technology == self.technology)
            && self.filter.matches(service)
    }

    pub fn is_all_technologies(&self) -> bool {
        self.technology.is_empty()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.technology.is_empty() {
            write!(f, "*/{}", self.filter)
        } else {
            write!(f, "{}/{}", self.technology, self.filter)
        }
    }
}

/// Per-projection configuration. Changing any field forces a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub technology: String,
    #[serde(default)]
    pub filter: ServiceFilter,
    #[serde(default)]
    pub sort: bool,
    #[serde(default)]
    pub group_by_category: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self::technology("wifi")
    }
}

impl ProjectionConfig {
    /// All services of one technology, in backend order.
    pub fn technology(name: &str) -> Self {
        Self {
            technology: name.to_owned(),
            filter: ServiceFilter::All,
            sort: false,
            group_by_category: false,
        }
    }

    /// Saved services of one technology (empty name: every technology), sorted.
    pub fn saved(technology: &str) -> Self {
        Self {
            technology: technology.to_owned(),
            filter: ServiceFilter::SavedOnly,
            sort: true,
            group_by_category: false,
        }
    }

    pub fn with_filter(mut self, filter: ServiceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_group_by_category(mut self, group: bool) -> Self {
        self.group_by_category = group;
        self
    }

    pub fn scope(&self) -> Scope {
        Scope {
            technology: self.technology.clone(),
            filter: self.filter,
        }
    }

    /// Ordering applied on refresh; `None` keeps backend arrival order.
    pub fn policy(&self) -> Option<SortPolicy> {
        match (self.sort, self.group_by_category) {
            (false, _) => None,
            (true, false) => Some(SortPolicy::Plain),
            (true, true) => Some(SortPolicy::Grouped),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_aliases() {
        assert_eq!(
            "saved".parse::<ServiceFilter>().unwrap(),
            ServiceFilter::SavedOnly
        );
        assert_eq!(
            "available_only".parse::<ServiceFilter>().unwrap(),
            ServiceFilter::AvailableOnly
        );
        assert_eq!(ServiceFilter::SavedOnly.to_string(), "saved_only");
    }

    #[test]
    fn scope_matches_technology_and_filter() {
        let scope = ProjectionConfig::saved("wifi").scope();
        let saved = Service::new("/s/a", "A", "wifi").with_saved(true);
        let unsaved = Service::new("/s/b", "B", "wifi");
        let other = Service::new("/s/c", "C", "ethernet").with_saved(true);
        assert!(scope.matches(&saved));
        assert!(!scope.matches(&unsaved));
        assert!(!scope.matches(&other));
    }

    #[test]
    fn empty_technology_spans_all() {
        let scope = ProjectionConfig::saved("").scope();
        assert!(scope.is_all_technologies());
        assert!(scope.matches(&Service::new("/s/c", "C", "ethernet").with_saved(true)));
        assert_eq!(scope.to_string(), "*/saved_only");
    }

    #[test]
    fn policy_follows_flags() {
        let cfg = ProjectionConfig::technology("wifi");
        assert_eq!(cfg.policy(), None);
        assert_eq!(cfg.clone().with_sort(true).policy(), Some(SortPolicy::Plain));
        assert_eq!(
            cfg.with_sort(true).with_group_by_category(true).policy(),
            Some(SortPolicy::Grouped)
        );
    }

    #[test]
    fn group_without_sort_keeps_arrival_order() {
        let cfg = ProjectionConfig::technology("wifi").with_group_by_category(true);
        assert!(cfg.policy().is_none());
    }
}
