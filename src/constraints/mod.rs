//! Constraint resolution against the provider's reference catalog.
//!
//! The catalog is constructed once at startup from the fetched plan and
//! region listings and is immutable afterwards, so it may be shared and
//! read concurrently without synchronisation. Constraint text is a
//! comma-separated list of `key=value` tokens; only `plan` and `region`
//! are recognised.

use thiserror::Error;

use crate::model::{Plan, PlanId, Region, RegionId};

/// Label of the plan used when no `plan` constraint is given.
pub const DEFAULT_PLAN_LABEL: &str = "Linode 1024";

/// Abbreviation of the region used when no `region` constraint is given.
pub const DEFAULT_REGION_ABBR: &str = "dallas";

/// Errors raised while resolving constraints.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConstraintError {
    /// A token was not of the form `key=value`.
    #[error("malformed constraint token '{0}'")]
    Malformed(String),
    /// A key other than `plan` or `region` was supplied.
    #[error("unknown constraint key '{0}'")]
    UnknownKey(String),
    /// The plan value matched nothing in the catalog.
    #[error("unknown plan '{0}'")]
    UnknownPlan(String),
    /// The region value matched nothing in the catalog.
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
    /// The expected default plan or region is absent from the catalog.
    #[error("default {kind} '{value}' is not present in the provider catalog")]
    MissingDefault {
        /// Which default could not be resolved (`plan` or `region`).
        kind: &'static str,
        /// The expected label or abbreviation.
        value: &'static str,
    },
}

/// Immutable reference catalog with resolved defaults.
#[derive(Clone, Debug)]
pub struct Catalog {
    plans: Vec<Plan>,
    regions: Vec<Region>,
    default_plan: PlanId,
    default_region: RegionId,
}

impl Catalog {
    /// Builds a catalog and resolves the process-wide defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::MissingDefault`] when the default plan
    /// or region is not present in the supplied reference data.
    pub fn new(plans: Vec<Plan>, regions: Vec<Region>) -> Result<Self, ConstraintError> {
        let default_plan = plans
            .iter()
            .find(|plan| plan.label == DEFAULT_PLAN_LABEL)
            .map(|plan| plan.id)
            .ok_or(ConstraintError::MissingDefault {
                kind: "plan",
                value: DEFAULT_PLAN_LABEL,
            })?;
        let default_region = regions
            .iter()
            .find(|region| region.abbr == DEFAULT_REGION_ABBR)
            .map(|region| region.id)
            .ok_or(ConstraintError::MissingDefault {
                kind: "region",
                value: DEFAULT_REGION_ABBR,
            })?;
        Ok(Self {
            plans,
            regions,
            default_plan,
            default_region,
        })
    }

    /// Resolves constraint text to a `(plan, region)` identifier pair.
    ///
    /// Plan matching is case-insensitive and accepts either the bare
    /// size token (`1024`) or the full label (`linode 1024`). Region
    /// matching is by exact abbreviation. Unspecified constraints fall
    /// back to the catalog defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError`] for malformed tokens, unknown keys,
    /// and values that match nothing in the catalog.
    pub fn solve(&self, text: &str) -> Result<(PlanId, RegionId), ConstraintError> {
        let mut plan = None;
        let mut region = None;

        for token in text.split(',').filter(|token| !token.trim().is_empty()) {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| ConstraintError::Malformed(token.trim().to_owned()))?;
            match key.trim() {
                "plan" => plan = Some(self.resolve_plan(value.trim())?),
                "region" => region = Some(self.resolve_region(value.trim())?),
                other => return Err(ConstraintError::UnknownKey(other.to_owned())),
            }
        }

        Ok((
            plan.unwrap_or(self.default_plan),
            region.unwrap_or(self.default_region),
        ))
    }

    fn resolve_plan(&self, value: &str) -> Result<PlanId, ConstraintError> {
        let qualified = format!("linode {value}");
        self.plans
            .iter()
            .find(|plan| {
                plan.label.eq_ignore_ascii_case(value)
                    || plan.label.eq_ignore_ascii_case(&qualified)
            })
            .map(|plan| plan.id)
            .ok_or_else(|| ConstraintError::UnknownPlan(value.to_owned()))
    }

    fn resolve_region(&self, value: &str) -> Result<RegionId, ConstraintError> {
        self.regions
            .iter()
            .find(|region| region.abbr == value)
            .map(|region| region.id)
            .ok_or_else(|| ConstraintError::UnknownRegion(value.to_owned()))
    }

    /// Returns the default plan identifier.
    #[must_use]
    pub const fn default_plan(&self) -> PlanId {
        self.default_plan
    }

    /// Returns the default region identifier.
    #[must_use]
    pub const fn default_region(&self) -> RegionId {
        self.default_region
    }

    /// Looks up a region's abbreviation by identifier.
    #[must_use]
    pub fn region_abbr(&self, id: RegionId) -> Option<&str> {
        self.regions
            .iter()
            .find(|region| region.id == id)
            .map(|region| region.abbr.as_str())
    }

    /// Returns the loaded plans.
    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Returns the loaded regions.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}

#[cfg(test)]
mod tests;
