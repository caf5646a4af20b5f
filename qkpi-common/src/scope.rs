//! Workshop scope resolution
//!
//! A report request names its scope as a free-form tag: nothing or `Total`
//! for the whole plant, a group tag, a single workshop, or a comma-separated
//! list of workshops. Resolution turns the tag into the workshops to sum
//! over and the key to look thresholds up under.

use serde::Serialize;
use std::collections::HashSet;

use crate::workshops::{is_canonical, is_total_tag, Group, CANONICAL_WORKSHOPS, TOTAL_TAG};
use crate::{Error, Result};

/// What kind of scope a tag resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    PlantTotal,
    Group(Group),
    Single,
    List,
}

/// Resolved scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeResolution {
    /// Workshop display names to aggregate, in request order
    pub workshops: Vec<String>,
    /// Key of directly stored thresholds, if the scope has one
    pub threshold_key: Option<String>,
    pub kind: ScopeKind,
}

impl ScopeResolution {
    pub fn plant_total() -> Self {
        Self {
            workshops: CANONICAL_WORKSHOPS.iter().map(|w| w.to_string()).collect(),
            threshold_key: Some(TOTAL_TAG.to_string()),
            kind: ScopeKind::PlantTotal,
        }
    }

    pub fn group(group: Group) -> Self {
        Self {
            workshops: group.members().iter().map(|w| w.to_string()).collect(),
            threshold_key: Some(group.tag().to_string()),
            kind: ScopeKind::Group(group),
        }
    }

    /// Only the plant-total scope carries a non-quality-cost index
    pub fn is_plant_total(&self) -> bool {
        self.kind == ScopeKind::PlantTotal
    }

    pub fn is_multi_workshop(&self) -> bool {
        self.workshops.len() > 1
    }

    /// Label used in responses and logs
    pub fn label(&self) -> String {
        match &self.threshold_key {
            Some(key) => key.clone(),
            None => self.workshops.join(","),
        }
    }
}

/// Maps scope tags to [`ScopeResolution`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeResolver {
    /// Reject names outside the canonical workshops instead of passing
    /// them through
    strict: bool,
}

impl ScopeResolver {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn resolve(&self, tag: Option<&str>) -> Result<ScopeResolution> {
        let tag = tag.map(str::trim).unwrap_or_default();

        if tag.is_empty() || is_total_tag(tag) {
            return Ok(ScopeResolution::plant_total());
        }

        if let Some(group) = Group::from_tag(tag) {
            return Ok(ScopeResolution::group(group));
        }

        if tag.contains(',') {
            return self.resolve_list(tag);
        }

        self.check_known(tag)?;
        Ok(ScopeResolution {
            workshops: vec![tag.to_string()],
            threshold_key: Some(tag.to_string()),
            kind: ScopeKind::Single,
        })
    }

    fn resolve_list(&self, tag: &str) -> Result<ScopeResolution> {
        let mut workshops: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        for item in tag.split(',').map(str::trim) {
            if item.is_empty() {
                return Err(Error::InvalidScope(format!(
                    "Empty workshop in list '{}'",
                    tag
                )));
            }
            if is_total_tag(item) || Group::from_tag(item).is_some() {
                return Err(Error::InvalidScope(format!(
                    "'{}' cannot be combined with other workshops",
                    item
                )));
            }
            if !seen.insert(item) {
                return Err(Error::InvalidScope(format!(
                    "Workshop '{}' listed twice",
                    item
                )));
            }
            self.check_known(item)?;
            workshops.push(item.to_string());
        }

        if workshops.len() == 1 {
            let key = workshops[0].clone();
            return Ok(ScopeResolution {
                workshops,
                threshold_key: Some(key),
                kind: ScopeKind::Single,
            });
        }

        // A list naming exactly a group's members shares the group's thresholds
        let group = Group::ALL.into_iter().find(|group| {
            group.members().len() == seen.len()
                && group.members().iter().all(|member| seen.contains(member))
        });

        Ok(ScopeResolution {
            workshops,
            threshold_key: group.map(|g| g.tag().to_string()),
            kind: ScopeKind::List,
        })
    }

    fn check_known(&self, workshop: &str) -> Result<()> {
        if self.strict && !is_canonical(workshop) {
            return Err(Error::InvalidScope(format!(
                "Unknown workshop '{}'",
                workshop
            )));
        }
        Ok(())
    }
}
