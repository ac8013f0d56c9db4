use lab_operator::cloud::memory::InMemoryTenancy;
use lab_operator::lab::{LabContext, Pacing};
use lab_operator::provision::{MembershipOutcome, PolicyOutcome};
use lab_operator::setup::run_setup;
use lab_operator::users_file::read_users;

fn write_users(dir: &tempfile::TempDir, contents: &str) -> Vec<String> {
    let path = dir.path().join("users.txt");
    std::fs::write(&path, contents).unwrap();
    read_users(&path).unwrap().accepted
}

#[test]
fn provisions_group_compartment_policy_and_user() {
    let dir = tempfile::tempdir().unwrap();
    let users = write_users(&dir, "bob@example.com\n");
    let tenancy = InMemoryTenancy::new("ocid1.tenancy.oc1..root");
    let ctx = LabContext::new(&tenancy, &tenancy, tenancy.tenancy_id(), Pacing::immediate());

    let report = run_setup(&ctx, "Lab1", &users).unwrap();

    let group = tenancy.group_named("Lab1").expect("group created");
    assert!(report.group.was_created());
    assert_eq!(report.group.id(), group.id);

    let compartment = tenancy.compartment_named("bobCompartment").expect("compartment created");
    assert_eq!(compartment.parent_id, "ocid1.tenancy.oc1..root");

    let user = tenancy.user_named("bob@example.com").expect("user created");
    assert_eq!(user.email.as_deref(), Some("bob@example.com"));
    let memberships = tenancy.memberships();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].user_id, user.id);
    assert_eq!(memberships[0].group_id, group.id);

    let policy = tenancy.policy_named("Lab1-BasePolicy").expect("policy created");
    assert_eq!(policy.compartment_id, "ocid1.tenancy.oc1..root");
    assert!(
        policy
            .statements
            .contains(&"allow group 'Lab1' to manage all-resources in compartment bobCompartment".to_string())
    );
    assert!(
        policy
            .statements
            .iter()
            .any(|statement| statement == "allow group 'Lab1' to use cloud-shell in tenancy")
    );
    assert!(matches!(report.policy, PolicyOutcome::Created(_)));
    assert_eq!(report.users.len(), 1);
    assert_eq!(report.users[0].membership, MembershipOutcome::Added);
}

#[test]
fn creates_compartments_before_the_policy_and_users_after() {
    let dir = tempfile::tempdir().unwrap();
    let users = write_users(&dir, "bob@example.com\nalice+test@example.com\n");
    let tenancy = InMemoryTenancy::new("root");
    let ctx = LabContext::new(&tenancy, &tenancy, "root", Pacing::immediate());

    run_setup(&ctx, "Lab1", &users).unwrap();

    let creates = tenancy.calls_starting_with("create_");
    assert_eq!(
        creates,
        vec![
            "create_group Lab1",
            "create_compartment bobCompartment",
            "create_compartment alice_testCompartment",
            "create_policy Lab1-BasePolicy",
            "create_user bob@example.com",
            "create_user alice+test@example.com",
        ]
    );
}

#[test]
fn rerunning_setup_creates_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let users = write_users(&dir, "bob@example.com\n");
    let tenancy = InMemoryTenancy::new("root");
    let ctx = LabContext::new(&tenancy, &tenancy, "root", Pacing::immediate());

    run_setup(&ctx, "Lab1", &users).unwrap();
    let created = tenancy.calls_starting_with("create_").len();
    let second = run_setup(&ctx, "Lab1", &users).unwrap();

    assert_eq!(tenancy.calls_starting_with("create_").len(), created);
    assert_eq!(tenancy.calls_starting_with("add_user_to_group").len(), 1);
    assert!(!second.group.was_created());
    assert_eq!(second.policy, PolicyOutcome::AlreadyExists);
    assert_eq!(second.users[0].membership, MembershipOutcome::AlreadyMember);
}

#[test]
fn rejects_invalid_lab_names_before_any_call() {
    let tenancy = InMemoryTenancy::new("root");
    let ctx = LabContext::new(&tenancy, &tenancy, "root", Pacing::immediate());
    assert!(run_setup(&ctx, "lab group", &["bob@example.com".to_string()]).is_err());
    assert!(tenancy.calls().is_empty());
}

#[test]
fn service_failures_abort_and_a_rerun_resumes() {
    let tenancy = InMemoryTenancy::new("root");
    let ctx = LabContext::new(&tenancy, &tenancy, "root", Pacing::immediate());
    let users = vec!["bob@example.com".to_string()];
    tenancy.fail_next("create_user bob@example.com", 500);

    let err = run_setup(&ctx, "Lab1", &users).unwrap_err();
    assert!(format!("{err:#}").contains("bob@example.com"));
    assert!(tenancy.policy_named("Lab1-BasePolicy").is_some());
    assert!(tenancy.user_named("bob@example.com").is_none());

    run_setup(&ctx, "Lab1", &users).unwrap();
    assert!(tenancy.user_named("bob@example.com").is_some());
    assert_eq!(tenancy.memberships().len(), 1);
}
