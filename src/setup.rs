use anyhow::{Context, anyhow};
use tracing::info;

use crate::lab::LabContext;
use crate::names;
use crate::provision::{self, MembershipOutcome, PolicyOutcome, Provisioned};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabUserReport {
    pub username: String,
    pub compartment_name: String,
    pub compartment: Provisioned,
    pub user: Provisioned,
    pub membership: MembershipOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupReport {
    pub group: Provisioned,
    pub policy_name: String,
    pub policy: PolicyOutcome,
    pub users: Vec<LabUserReport>,
}

/// Provision a lab: the group, one compartment per user, the shared base
/// policy, then each user account and its group membership. Any failure
/// aborts the run; re-running picks up where it stopped.
pub fn run_setup(ctx: &LabContext<'_>, lab_name: &str, usernames: &[String]) -> anyhow::Result<SetupReport> {
    if !names::is_valid_name(lab_name) {
        return Err(anyhow!("invalid lab group name `{lab_name}`"));
    }
    let group = provision::get_or_create_group(ctx, lab_name)
        .with_context(|| format!("get or create group {lab_name}"))?;

    let mut compartments = Vec::with_capacity(usernames.len());
    for username in usernames {
        let compartment_name = names::compartment_name_for(username);
        let compartment = provision::get_or_create_compartment(ctx, &compartment_name)
            .with_context(|| format!("get or create compartment {compartment_name}"))?;
        compartments.push((compartment_name, compartment));
    }

    let policy_name = names::base_policy_name(lab_name);
    let compartment_names: Vec<&str> = compartments.iter().map(|(name, _)| name.as_str()).collect();
    let statements = names::base_policy_statements(lab_name, &compartment_names);
    let policy = provision::create_policy_if_absent(ctx, &ctx.tenancy_id, &policy_name, &statements)
        .with_context(|| format!("create policy {policy_name}"))?;

    let mut users = Vec::with_capacity(usernames.len());
    for (username, (compartment_name, compartment)) in usernames.iter().zip(compartments) {
        let user = provision::get_or_create_user(ctx, username)
            .with_context(|| format!("get or create user {username}"))?;
        let membership = provision::add_user_to_group(ctx, user.id(), group.id())
            .with_context(|| format!("add {username} to group {lab_name}"))?;
        users.push(LabUserReport {
            username: username.clone(),
            compartment_name,
            compartment,
            user,
            membership,
        });
    }

    info!(lab = lab_name, users = users.len(), "lab setup finished");
    println!("Lab group setup completed successfully!");
    Ok(SetupReport {
        group,
        policy_name,
        policy,
        users,
    })
}
