use lab_operator::cleanup::{PurgeOptions, run_purge};
use lab_operator::cloud::AiResourceKind;
use lab_operator::cloud::memory::InMemoryTenancy;
use lab_operator::lab::{LabContext, Pacing};

const ROOT: &str = "root";

#[test]
fn purges_matching_compartments_case_insensitively() {
    let tenancy = InMemoryTenancy::new(ROOT);
    let upper = tenancy.seed_compartment("LAB1-bob");
    let lower = tenancy.seed_compartment("lab1-carol");
    let other = tenancy.seed_compartment("Sandbox");
    tenancy.seed_ai_resource(AiResourceKind::Agent, &upper.id, "helper");
    tenancy.seed_ai_resource(AiResourceKind::Endpoint, &upper.id, "public");
    tenancy.seed_ai_resource(AiResourceKind::KnowledgeBase, &lower.id, "docs");
    tenancy.seed_ai_resource(AiResourceKind::Tool, &other.id, "search");
    let ctx = LabContext::new(&tenancy, &tenancy, ROOT, Pacing::immediate());

    let report = run_purge(&ctx, "Lab1", PurgeOptions::default()).unwrap();

    assert_eq!(report.compartments, vec!["LAB1-bob", "lab1-carol"]);
    assert_eq!(report.resources_deleted, 3);
    assert!(report.failures.is_empty());
    assert!(tenancy.compartment_named("LAB1-bob").is_none());
    assert!(tenancy.compartment_named("lab1-carol").is_none());
    assert_eq!(tenancy.ai_resources(&other.id).len(), 1);
    assert!(tenancy.compartment_named("Sandbox").is_some());
}

#[test]
fn keep_compartments_only_clears_resources() {
    let tenancy = InMemoryTenancy::new(ROOT);
    let compartment = tenancy.seed_compartment("Lab1-bob");
    tenancy.seed_ai_resource(AiResourceKind::Tool, &compartment.id, "search");
    let ctx = LabContext::new(&tenancy, &tenancy, ROOT, Pacing::immediate());
    let options = PurgeOptions {
        delete_compartments: false,
        ..PurgeOptions::default()
    };

    let report = run_purge(&ctx, "Lab1", options).unwrap();

    assert_eq!(report.resources_deleted, 1);
    assert!(tenancy.ai_resources(&compartment.id).is_empty());
    assert!(tenancy.compartment_named("Lab1-bob").is_some());
    assert!(tenancy.calls_starting_with("delete_compartment").is_empty());
}

#[test]
fn failures_per_kind_are_reported_and_skipped() {
    let tenancy = InMemoryTenancy::new(ROOT);
    let compartment = tenancy.seed_compartment("Lab1-bob");
    tenancy.seed_ai_resource(AiResourceKind::Tool, &compartment.id, "search");
    tenancy.seed_ai_resource(AiResourceKind::KnowledgeBase, &compartment.id, "docs");
    tenancy.fail_next("list_tools Lab1-bob", 500);
    let ctx = LabContext::new(&tenancy, &tenancy, ROOT, Pacing::immediate());

    let report = run_purge(&ctx, "Lab1", PurgeOptions::default()).unwrap();

    // The tool survives, so the compartment delete is refused as well.
    assert_eq!(report.resources_deleted, 1);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[0].contains("Tool"));
    assert!(tenancy.compartment_named("Lab1-bob").is_some());
    assert_eq!(tenancy.ai_resources(&compartment.id).len(), 1);
}

#[test]
fn no_wait_issues_deletes_without_polling() {
    let tenancy = InMemoryTenancy::new(ROOT);
    let compartment = tenancy.seed_compartment("Lab1-bob");
    tenancy.seed_ai_resource(AiResourceKind::Tool, &compartment.id, "search");
    let ctx = LabContext::new(&tenancy, &tenancy, ROOT, Pacing::immediate());
    let options = PurgeOptions {
        delete_compartments: false,
        wait: false,
    };

    let report = run_purge(&ctx, "Lab1", options).unwrap();

    assert_eq!(report.resources_deleted, 1);
    assert_eq!(tenancy.calls_starting_with("delete_tools"), vec!["delete_tools search"]);
    assert!(tenancy.calls_starting_with("get_tools").is_empty());
}

#[test]
fn no_wait_leaves_compartments_for_a_later_run() {
    let tenancy = InMemoryTenancy::new(ROOT);
    tenancy.set_deletion_lag(2);
    let compartment = tenancy.seed_compartment("Lab1-bob");
    tenancy.seed_ai_resource(AiResourceKind::Agent, &compartment.id, "helper");
    let ctx = LabContext::new(&tenancy, &tenancy, ROOT, Pacing::immediate());
    let options = PurgeOptions {
        delete_compartments: true,
        wait: false,
    };

    let report = run_purge(&ctx, "Lab1", options).unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.compartments, vec!["Lab1-bob"]);
    assert!(tenancy.calls_starting_with("delete_compartment").is_empty());
    assert!(tenancy.compartment_named("Lab1-bob").is_some());
}

#[test]
fn nothing_matching_is_a_quiet_success() {
    let tenancy = InMemoryTenancy::new(ROOT);
    tenancy.seed_compartment("Sandbox");
    let ctx = LabContext::new(&tenancy, &tenancy, ROOT, Pacing::immediate());

    let report = run_purge(&ctx, "Lab1", PurgeOptions::default()).unwrap();

    assert!(report.compartments.is_empty());
    assert_eq!(tenancy.calls(), vec!["list_compartments root"]);
}
