//! Delete helpers, and the bounded poll that waits for the control plane to
//! finish an asynchronous deletion.

use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::cloud::{
    AiResourceKind, CloudError, CloudResult, Compartment, Group, LifecycleState, Membership,
    MembershipFilter, User,
};
use crate::lab::{LabContext, Pacing};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    Contains,
    ContainsIgnoreCase,
}

impl NameMatch {
    pub fn matches(self, candidate: &str, pattern: &str) -> bool {
        match self {
            NameMatch::Exact => candidate == pattern,
            NameMatch::Contains => candidate.contains(pattern),
            NameMatch::ContainsIgnoreCase => candidate
                .to_lowercase()
                .contains(&pattern.to_lowercase()),
        }
    }
}

/// Call `current_state` until it reports 404 or a `DELETED` state. Other errors are
/// returned as is; running past `pacing.deletion_timeout` is a
/// [`CloudError::DeletionTimeout`].
pub fn wait_for_deletion<F>(label: &str, name: &str, pacing: &Pacing, mut current_state: F) -> CloudResult<()>
where
    F: FnMut() -> CloudResult<LifecycleState>,
{
    let started = Instant::now();
    loop {
        match current_state() {
            Ok(state) if state.is_deleted() => break,
            Ok(state) => debug!(label, name, ?state, "still present"),
            Err(err) if err.is_not_found() => break,
            Err(err) => return Err(err),
        }
        let waited = started.elapsed();
        if waited >= pacing.deletion_timeout {
            return Err(CloudError::DeletionTimeout {
                resource: format!("{label} '{name}'"),
                waited,
            });
        }
        println!("Waiting for {label} '{name}' to be deleted...");
        thread::sleep(pacing.poll_interval);
    }
    println!("{label} '{name}' deleted.");
    Ok(())
}

pub fn find_group(ctx: &LabContext<'_>, name: &str) -> CloudResult<Option<Group>> {
    let groups = ctx.identity.list_groups(&ctx.tenancy_id)?;
    Ok(groups.into_iter().find(|group| group.name == name))
}

pub fn compartments_matching(
    ctx: &LabContext<'_>,
    pattern: &str,
    mode: NameMatch,
) -> CloudResult<Vec<Compartment>> {
    let compartments = ctx.identity.list_active_compartments(&ctx.tenancy_id)?;
    Ok(compartments
        .into_iter()
        .filter(|compartment| mode.matches(&compartment.name, pattern))
        .collect())
}

/// Delete every resource of one kind in a compartment. Returns how many
/// delete calls were issued.
pub fn delete_ai_resources(
    ctx: &LabContext<'_>,
    kind: AiResourceKind,
    compartment_id: &str,
    wait: bool,
) -> CloudResult<usize> {
    let resources = ctx.agents.list(kind, compartment_id)?;
    let mut deleted = 0;
    for resource in resources {
        match resource.lifecycle_state {
            LifecycleState::Deleted => continue,
            LifecycleState::Deleting => {
                println!("{kind} '{}' is already being deleted.", resource.display_name);
            }
            _ => {
                println!("Deleting {kind}: {}", resource.display_name);
                ctx.agents.delete(kind, &resource.id)?;
                info!(kind = kind.label(), id = %resource.id, "delete requested");
                deleted += 1;
            }
        }
        if wait {
            wait_for_deletion(kind.label(), &resource.display_name, &ctx.pacing, || {
                ctx.agents
                    .get(kind, &resource.id)
                    .map(|current| current.lifecycle_state)
            })?;
        }
        ctx.pacing.pause();
    }
    Ok(deleted)
}

/// Empty a compartment of agent-family resources: endpoints, tools,
/// knowledge bases, then agents.
pub fn purge_compartment_ai_resources(
    ctx: &LabContext<'_>,
    compartment_id: &str,
    wait: bool,
) -> CloudResult<()> {
    for kind in AiResourceKind::TEARDOWN_ORDER {
        delete_ai_resources(ctx, kind, compartment_id, wait)?;
    }
    Ok(())
}

/// Purge AI resources, delete the compartment, and wait for it to go away.
pub fn delete_compartment_and_wait(ctx: &LabContext<'_>, compartment: &Compartment) -> CloudResult<()> {
    println!(
        "Processing compartment '{}' (OCID: {})",
        compartment.name, compartment.id
    );
    purge_compartment_ai_resources(ctx, &compartment.id, true)?;
    println!("Deleting compartment: {}", compartment.name);
    ctx.identity.delete_compartment(&compartment.id)?;
    info!(id = %compartment.id, name = %compartment.name, "compartment delete requested");
    wait_for_deletion("Compartment", &compartment.name, &ctx.pacing, || {
        ctx.identity
            .get_compartment(&compartment.id)
            .map(|current| current.lifecycle_state)
    })
}

/// Returns `false` when no active compartment has that exact name.
pub fn delete_compartment_named(ctx: &LabContext<'_>, name: &str) -> CloudResult<bool> {
    let Some(compartment) = compartments_matching(ctx, name, NameMatch::Exact)?
        .into_iter()
        .next()
    else {
        return Ok(false);
    };
    delete_compartment_and_wait(ctx, &compartment)?;
    Ok(true)
}

/// Returns `false` when the compartment holds no policy with that name.
pub fn delete_policy_named(ctx: &LabContext<'_>, compartment_id: &str, name: &str) -> CloudResult<bool> {
    let policies = ctx.identity.list_policies(compartment_id)?;
    let Some(policy) = policies.into_iter().find(|policy| policy.name == name) else {
        return Ok(false);
    };
    ctx.identity.delete_policy(&policy.id)?;
    println!("Deleted policy {name}");
    Ok(true)
}

pub fn remove_membership(ctx: &LabContext<'_>, membership: &Membership) -> CloudResult<()> {
    ctx.identity.remove_user_from_group(&membership.id)?;
    println!(
        "Removed user {} from group {}",
        membership.user_id, membership.group_id
    );
    Ok(())
}

pub fn delete_user(ctx: &LabContext<'_>, user: &User) -> CloudResult<()> {
    ctx.identity.delete_user(&user.id)?;
    println!("Deleted user {}", user.name);
    Ok(())
}
