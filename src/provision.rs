//! Idempotent get-or-create helpers. An existing resource is returned as is
//! and never modified.

use tracing::debug;

use crate::cloud::{
    CloudResult, CreateCompartmentDetails, CreateGroupDetails, CreatePolicyDetails,
    CreateUserDetails, MembershipFilter,
};
use crate::lab::LabContext;
use crate::names;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provisioned {
    Existing(String),
    Created(String),
}

impl Provisioned {
    pub fn id(&self) -> &str {
        match self {
            Provisioned::Existing(id) | Provisioned::Created(id) => id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Provisioned::Created(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyOutcome {
    Created(String),
    AlreadyExists,
    InvalidName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipOutcome {
    Added,
    AlreadyMember,
}

pub fn get_or_create_group(ctx: &LabContext<'_>, name: &str) -> CloudResult<Provisioned> {
    let groups = ctx.identity.list_groups(&ctx.tenancy_id)?;
    if let Some(group) = groups.into_iter().find(|group| group.name == name) {
        println!("Group '{name}' already exists. Using existing group.");
        return Ok(Provisioned::Existing(group.id));
    }
    let group = ctx.identity.create_group(&CreateGroupDetails {
        compartment_id: ctx.tenancy_id.clone(),
        name: name.to_string(),
        description: format!("Lab group {name}"),
    })?;
    println!("Created group: {}, OCID: {}", group.name, group.id);
    Ok(Provisioned::Created(group.id))
}

/// Compartments are matched among active compartments anywhere in the
/// tenancy and created directly under the root.
pub fn get_or_create_compartment(ctx: &LabContext<'_>, name: &str) -> CloudResult<Provisioned> {
    let compartments = ctx.identity.list_active_compartments(&ctx.tenancy_id)?;
    if let Some(compartment) = compartments.into_iter().find(|c| c.name == name) {
        println!("Compartment '{name}' already exists. Using existing compartment.");
        return Ok(Provisioned::Existing(compartment.id));
    }
    let compartment = ctx.identity.create_compartment(&CreateCompartmentDetails {
        compartment_id: ctx.tenancy_id.clone(),
        name: name.to_string(),
        description: format!("Compartment for {name}"),
    })?;
    println!(
        "Created compartment: {}, OCID: {}",
        compartment.name, compartment.id
    );
    Ok(Provisioned::Created(compartment.id))
}

pub fn get_or_create_user(ctx: &LabContext<'_>, email: &str) -> CloudResult<Provisioned> {
    let users = ctx.identity.list_users(&ctx.tenancy_id)?;
    if let Some(user) = users.into_iter().find(|user| user.name == email) {
        println!("User '{email}' already exists. Using existing user.");
        return Ok(Provisioned::Existing(user.id));
    }
    let user = ctx.identity.create_user(&CreateUserDetails {
        compartment_id: ctx.tenancy_id.clone(),
        name: email.to_string(),
        description: format!("Lab user {email}"),
        email: email.to_string(),
    })?;
    println!("Created user: {email}, OCID: {}", user.id);
    Ok(Provisioned::Created(user.id))
}

pub fn create_policy_if_absent(
    ctx: &LabContext<'_>,
    compartment_id: &str,
    name: &str,
    statements: &[String],
) -> CloudResult<PolicyOutcome> {
    if !names::is_valid_name(name) {
        println!("Skipping invalid policy name: {name}");
        return Ok(PolicyOutcome::InvalidName);
    }
    let policies = ctx.identity.list_policies(compartment_id)?;
    if policies.iter().any(|policy| policy.name == name) {
        println!("Policy '{name}' already exists. Skipping.");
        return Ok(PolicyOutcome::AlreadyExists);
    }
    let policy = ctx.identity.create_policy(&CreatePolicyDetails {
        compartment_id: compartment_id.to_string(),
        name: name.to_string(),
        description: format!("Policy for {name}"),
        statements: statements.to_vec(),
    })?;
    println!("Created policy: {}, OCID: {}", policy.name, policy.id);
    Ok(PolicyOutcome::Created(policy.id))
}

/// Add a user to a group unless a membership already exists. A 409 from the
/// add call means another writer got there first.
pub fn add_user_to_group(
    ctx: &LabContext<'_>,
    user_id: &str,
    group_id: &str,
) -> CloudResult<MembershipOutcome> {
    let memberships = ctx
        .identity
        .list_memberships(&ctx.tenancy_id, &MembershipFilter::User(user_id.to_string()))?;
    if memberships
        .iter()
        .any(|membership| membership.group_id == group_id)
    {
        println!("User {user_id} is already in group {group_id}, skipping.");
        return Ok(MembershipOutcome::AlreadyMember);
    }
    match ctx.identity.add_user_to_group(user_id, group_id) {
        Ok(membership) => {
            debug!(membership_id = %membership.id, user_id, group_id, "membership created");
            println!("Added user {user_id} to group {group_id}");
            Ok(MembershipOutcome::Added)
        }
        Err(err) if err.is_conflict() => {
            println!("User {user_id} is already in group {group_id} (duplicate). Skipping.");
            Ok(MembershipOutcome::AlreadyMember)
        }
        Err(err) => Err(err),
    }
}
