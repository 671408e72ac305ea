//! Tests for the validated mapping from provider payloads.

use rstest::rstest;
use serde_json::json;

use super::{Disk, DiskKind, Instance, InstanceStatus, Job, Plan, Region};

#[test]
fn instance_parses_upper_case_fields() {
    let payload = json!({
        "LINODEID": 8098, "LABEL": "linode8098", "TOTALRAM": 1024,
        "TOTALHD": 24576, "TOTALXFER": 2000, "STATUS": 1,
        "DATACENTERID": 2, "PLANID": 1,
        "ALERT_CPU_ENABLED": 1, "WATCHDOG": 1
    });
    let instance: Instance = serde_json::from_value(payload).expect("instance should parse");

    assert_eq!(instance.id.0, 8098);
    assert_eq!(instance.status, InstanceStatus::Running);
    assert_eq!(instance.region_id.0, 2);
    assert!(instance.ip_addresses.is_empty());
    assert_eq!(instance.remote_access_name, "");
}

#[rstest]
#[case(-1, InstanceStatus::BeingCreated)]
#[case(0, InstanceStatus::BrandNew)]
#[case(1, InstanceStatus::Running)]
#[case(2, InstanceStatus::PoweredOff)]
#[case(9, InstanceStatus::Unknown(9))]
fn status_codes_map_to_variants(#[case] code: i64, #[case] expected: InstanceStatus) {
    assert_eq!(InstanceStatus::from_code(code), expected);
}

#[test]
fn pending_job_has_empty_finish_fields() {
    let payload = json!({
        "JOBID": 992, "LINODEID": 8098, "ACTION": "linode.boot",
        "LABEL": "Linode boot", "ENTERED_DT": "2014-01-01 10:00:00.0",
        "HOST_START_DT": "", "HOST_FINISH_DT": "", "DURATION": "",
        "HOST_MESSAGE": "", "HOST_SUCCESS": ""
    });
    let job: Job = serde_json::from_value(payload).expect("job should parse");

    assert!(job.is_pending());
    assert_eq!(job.succeeded, None);
    assert_eq!(job.duration, None);
}

#[test]
fn finished_job_reports_success() {
    let payload = json!({
        "JOBID": 993, "LINODEID": 8098, "ACTION": "linode.boot",
        "LABEL": "Linode boot", "ENTERED_DT": "2014-01-01 10:00:00.0",
        "HOST_START_DT": "2014-01-01 10:00:05.0",
        "HOST_FINISH_DT": "2014-01-01 10:00:40.0",
        "DURATION": 35, "HOST_MESSAGE": "", "HOST_SUCCESS": 1
    });
    let job: Job = serde_json::from_value(payload).expect("job should parse");

    assert!(!job.is_pending());
    assert_eq!(job.succeeded, Some(true));
    assert_eq!(job.duration, Some(35));
}

#[test]
fn disk_flags_accept_numeric_booleans() {
    let payload = json!({
        "DISKID": 55647, "LINODEID": 8098, "LABEL": "swap",
        "TYPE": "swap", "SIZE": 256, "ISREADONLY": 0,
        "CREATE_DT": "2014-01-01 10:00:00.0", "UPDATE_DT": ""
    });
    let disk: Disk = serde_json::from_value(payload).expect("disk should parse");

    assert!(disk.kind.is_swap());
    assert!(!disk.read_only);
    assert_eq!(disk.updated_at, None);
}

#[test]
fn unrecognised_disk_type_is_preserved() {
    let payload = json!({
        "DISKID": 1, "LINODEID": 2, "LABEL": "weird",
        "TYPE": "xfs", "SIZE": 100, "ISREADONLY": 1
    });
    let disk: Disk = serde_json::from_value(payload).expect("disk should parse");

    assert_eq!(disk.kind, DiskKind::Other(String::from("xfs")));
    assert!(disk.read_only);
}

#[test]
fn plan_and_region_reference_data_parse() {
    let plan: Plan = serde_json::from_value(json!({
        "PLANID": 1, "LABEL": "Linode 1024", "RAM": 1024, "DISK": 24,
        "XFER": 2000, "CORES": 1, "PRICE": 10.0, "HOURLY": 0.015
    }))
    .expect("plan should parse");
    let region: Region = serde_json::from_value(json!({
        "DATACENTERID": 2, "LOCATION": "Dallas, TX, USA", "ABBR": "dallas"
    }))
    .expect("region should parse");

    assert_eq!(plan.label, "Linode 1024");
    assert_eq!(region.abbr, "dallas");
}
