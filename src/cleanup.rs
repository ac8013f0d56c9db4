//! Lab teardown and the AI-resource purge.

use anyhow::Context;
use tracing::{info, warn};

use crate::cloud::{AiResourceKind, Group, Membership, MembershipFilter, User};
use crate::lab::LabContext;
use crate::names;
use crate::teardown::{self, NameMatch};

/// What teardown does when no group carries the lab name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupFallback {
    /// Delete every active compartment whose name contains the lab name.
    #[default]
    Scan,
    /// Report and stop.
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownOptions {
    pub fallback: GroupFallback,
    pub delete_users: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub group_found: bool,
    pub compartments_deleted: Vec<String>,
    pub compartments_missing: Vec<String>,
    pub compartment_failures: Vec<(String, String)>,
    pub policies_deleted: Vec<String>,
    pub memberships_removed: usize,
    pub users_deleted: Vec<String>,
    pub unresolved_members: Vec<String>,
}

pub fn run_teardown(
    ctx: &LabContext<'_>,
    lab_name: &str,
    options: TeardownOptions,
) -> anyhow::Result<TeardownReport> {
    let group = teardown::find_group(ctx, lab_name)
        .with_context(|| format!("look up group {lab_name}"))?;
    let Some(group) = group else {
        println!("No group found with name {lab_name}");
        let mut report = TeardownReport::default();
        if options.fallback == GroupFallback::Scan {
            delete_lab_compartments(ctx, lab_name, &mut report)?;
        }
        return Ok(report);
    };
    println!("Found group: {}, OCID: {}", group.name, group.id);
    teardown_group(ctx, lab_name, &group, options)
}

fn teardown_group(
    ctx: &LabContext<'_>,
    lab_name: &str,
    group: &Group,
    options: TeardownOptions,
) -> anyhow::Result<TeardownReport> {
    let mut report = TeardownReport {
        group_found: true,
        ..TeardownReport::default()
    };

    let (memberships, members) = resolve_members(ctx, group, &mut report)?;

    for user in &members {
        let compartment_name = names::compartment_name_for(&user.name);
        match teardown::delete_compartment_named(ctx, &compartment_name) {
            Ok(true) => report.compartments_deleted.push(compartment_name),
            Ok(false) => {
                println!("Compartment {compartment_name} not found, skipping.");
                report.compartments_missing.push(compartment_name);
            }
            Err(err) => {
                println!("Error deleting compartment {compartment_name}: {err}");
                warn!(compartment = %compartment_name, error = %err, "compartment teardown failed");
                report
                    .compartment_failures
                    .push((compartment_name, err.to_string()));
            }
        }
        ctx.pacing.pause();
    }

    let mut policy_names = vec![names::base_policy_name(lab_name)];
    policy_names.extend(
        members
            .iter()
            .map(|user| names::user_policy_name(lab_name, &names::compartment_name_for(&user.name))),
    );
    for policy_name in policy_names {
        if teardown::delete_policy_named(ctx, &ctx.tenancy_id, &policy_name)
            .with_context(|| format!("delete policy {policy_name}"))?
        {
            report.policies_deleted.push(policy_name);
        }
    }

    // A group can only be deleted once it has no members.
    for membership in &memberships {
        match teardown::remove_membership(ctx, membership) {
            Ok(()) => report.memberships_removed += 1,
            Err(err) => {
                println!("Error removing membership {}: {err}", membership.id);
                warn!(membership = %membership.id, error = %err, "membership removal failed");
            }
        }
    }

    if options.delete_users {
        for user in &members {
            match teardown::delete_user(ctx, user) {
                Ok(()) => report.users_deleted.push(user.name.clone()),
                Err(err) => {
                    println!("Error deleting user {}: {err}", user.name);
                    warn!(user = %user.name, error = %err, "user teardown failed");
                }
            }
            ctx.pacing.pause();
        }
    }

    ctx.identity
        .delete_group(&group.id)
        .with_context(|| format!("delete group {lab_name}"))?;
    println!("Deleted group {lab_name}");
    info!(
        lab = lab_name,
        compartments = report.compartments_deleted.len(),
        failures = report.compartment_failures.len(),
        "lab teardown finished"
    );
    Ok(report)
}

/// The group's memberships and the member accounts behind them. Members
/// whose account is already gone are skipped; any other lookup failure aborts.
fn resolve_members(
    ctx: &LabContext<'_>,
    group: &Group,
    report: &mut TeardownReport,
) -> anyhow::Result<(Vec<Membership>, Vec<User>)> {
    let memberships = ctx
        .identity
        .list_memberships(&ctx.tenancy_id, &MembershipFilter::Group(group.id.clone()))
        .with_context(|| format!("list memberships of {}", group.name))?;
    let mut users = Vec::with_capacity(memberships.len());
    for membership in &memberships {
        match ctx.identity.get_user(&membership.user_id) {
            Ok(user) => users.push(user),
            Err(err) if err.is_not_found() => {
                println!("User {} not found, skipping...", membership.user_id);
                report.unresolved_members.push(membership.user_id.clone());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("get user {}", membership.user_id));
            }
        }
    }
    Ok((memberships, users))
}

fn delete_lab_compartments(
    ctx: &LabContext<'_>,
    lab_name: &str,
    report: &mut TeardownReport,
) -> anyhow::Result<()> {
    let compartments = teardown::compartments_matching(ctx, lab_name, NameMatch::Contains)
        .context("list compartments")?;
    if compartments.is_empty() {
        println!("No compartments found for lab group '{lab_name}'");
        return Ok(());
    }
    for compartment in compartments {
        match teardown::delete_compartment_and_wait(ctx, &compartment) {
            Ok(()) => {
                println!("Compartment '{}' deleted successfully.", compartment.name);
                report.compartments_deleted.push(compartment.name);
            }
            Err(err) => {
                println!("Failed to delete compartment {}: {err}", compartment.name);
                report
                    .compartment_failures
                    .push((compartment.name, err.to_string()));
            }
        }
        ctx.pacing.pause();
    }
    Ok(())
}

/// `delete_compartments` only takes effect while `wait` is set: a compartment
/// cannot be deleted until its resources are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurgeOptions {
    pub delete_compartments: bool,
    pub wait: bool,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            delete_compartments: true,
            wait: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub compartments: Vec<String>,
    pub resources_deleted: usize,
    pub failures: Vec<String>,
}

/// Clear agent-family resources from every active compartment whose name
/// contains `lab_name` (case-insensitive), optionally deleting the
/// compartments too. Failures are reported per kind and per compartment and
/// do not stop the sweep.
pub fn run_purge(
    ctx: &LabContext<'_>,
    lab_name: &str,
    options: PurgeOptions,
) -> anyhow::Result<PurgeReport> {
    let compartments = teardown::compartments_matching(ctx, lab_name, NameMatch::ContainsIgnoreCase)
        .context("list compartments")?;
    let mut report = PurgeReport::default();
    if compartments.is_empty() {
        println!("No compartments found for lab group '{lab_name}'");
        return Ok(report);
    }

    for compartment in compartments {
        println!(
            "Cleaning resources in compartment {} (OCID: {})...",
            compartment.name, compartment.id
        );
        for kind in AiResourceKind::TEARDOWN_ORDER {
            match teardown::delete_ai_resources(ctx, kind, &compartment.id, options.wait) {
                Ok(count) => report.resources_deleted += count,
                Err(err) => {
                    println!("No {kind}s or error: {err}");
                    report
                        .failures
                        .push(format!("{} {kind}: {err}", compartment.name));
                }
            }
        }
        if options.delete_compartments && !options.wait {
            // Resource deletes are still in flight, so the compartment would refuse.
            println!(
                "Skipping deletion of compartment {} until its resources are gone",
                compartment.name
            );
        } else if options.delete_compartments {
            let deleted = ctx.identity.delete_compartment(&compartment.id).and_then(|()| {
                teardown::wait_for_deletion("Compartment", &compartment.name, &ctx.pacing, || {
                    ctx.identity
                        .get_compartment(&compartment.id)
                        .map(|current| current.lifecycle_state)
                })
            });
            match deleted {
                Ok(()) => println!("Deleted compartment {}", compartment.name),
                Err(err) => {
                    println!("Error deleting compartment {}: {err}", compartment.name);
                    report.failures.push(format!("{}: {err}", compartment.name));
                }
            }
        }
        report.compartments.push(compartment.name);
    }
    Ok(report)
}
