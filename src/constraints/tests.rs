//! Tests for constraint resolution.

use rstest::rstest;

use super::{Catalog, ConstraintError};
use crate::model::{Plan, PlanId, Region, RegionId};

fn plan(id: u64, label: &str, ram: u64) -> Plan {
    Plan {
        id: PlanId(id),
        label: label.to_owned(),
        ram,
        disk: 24,
        xfer: 2000,
        cores: 1,
        price: 10.0,
        hourly: 0.015,
    }
}

fn region(id: u64, abbr: &str) -> Region {
    Region {
        id: RegionId(id),
        location: format!("{abbr}, somewhere"),
        abbr: abbr.to_owned(),
    }
}

fn catalog() -> Catalog {
    Catalog::new(
        vec![
            plan(1, "Linode 1024", 1024),
            plan(2, "Linode 2048", 2048),
            plan(4, "Linode 4096", 4096),
        ],
        vec![region(2, "dallas"), region(3, "fremont"), region(6, "newark")],
    )
    .expect("catalog defaults should resolve")
}

#[test]
fn empty_constraints_return_the_defaults() {
    let catalog = catalog();
    let (plan, region) = catalog.solve("").expect("empty text should solve");

    assert_eq!(plan, catalog.default_plan());
    assert_eq!(region, catalog.default_region());
    assert_eq!(plan, PlanId(1));
    assert_eq!(region, RegionId(2));
}

#[rstest]
#[case("plan=2048", 2, 2)]
#[case("plan=Linode 2048", 2, 2)]
#[case("plan=LINODE 4096", 4, 2)]
#[case("region=newark", 1, 6)]
#[case("plan=4096,region=fremont", 4, 3)]
#[case(" plan = 2048 , region = newark ", 2, 6)]
fn well_formed_constraints_resolve_catalog_identifiers(
    #[case] text: &str,
    #[case] plan_id: u64,
    #[case] region_id: u64,
) {
    let (plan, region) = catalog().solve(text).expect("constraints should solve");

    assert_eq!(plan, PlanId(plan_id));
    assert_eq!(region, RegionId(region_id));
}

#[test]
fn unknown_keys_fail_instead_of_defaulting() {
    let err = catalog().solve("cores=8").expect_err("unknown key should fail");
    assert_eq!(err, ConstraintError::UnknownKey(String::from("cores")));
}

#[test]
fn malformed_tokens_are_rejected() {
    let err = catalog().solve("plan").expect_err("missing '=' should fail");
    assert_eq!(err, ConstraintError::Malformed(String::from("plan")));
}

#[test]
fn unmatched_plan_fails() {
    let err = catalog()
        .solve("plan=512")
        .expect_err("unknown plan should fail");
    assert_eq!(err, ConstraintError::UnknownPlan(String::from("512")));
}

#[test]
fn region_match_is_exact() {
    let err = catalog()
        .solve("region=Dallas")
        .expect_err("abbreviations are case-sensitive");
    assert_eq!(err, ConstraintError::UnknownRegion(String::from("Dallas")));
}

#[test]
fn catalog_requires_the_default_plan() {
    let err = Catalog::new(vec![plan(2, "Linode 2048", 2048)], vec![region(2, "dallas")])
        .expect_err("missing default plan should fail");
    assert!(matches!(
        err,
        ConstraintError::MissingDefault { kind: "plan", .. }
    ));
}

#[test]
fn catalog_requires_the_default_region() {
    let err = Catalog::new(vec![plan(1, "Linode 1024", 1024)], vec![region(3, "fremont")])
        .expect_err("missing default region should fail");
    assert!(matches!(
        err,
        ConstraintError::MissingDefault { kind: "region", .. }
    ));
}
