//! In-process tenancy implementing both service seams.
//!
//! Every call is appended to a journal (`"<operation> <name>"`) so callers can
//! assert on ordering. Deletions of compartments and AI resources are
//! asynchronous like the real control plane: the resource reports `DELETING`
//! for a configurable number of polls, then disappears (404).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use super::{
    AgentApi, AiResource, AiResourceKind, CloudError, CloudResult, Compartment,
    CreateCompartmentDetails, CreateGroupDetails, CreatePolicyDetails, CreateUserDetails, Group,
    IdentityApi, LifecycleState, Membership, MembershipFilter, Policy, User,
};

#[derive(Default)]
struct State {
    next_id: u64,
    groups: Vec<Group>,
    users: Vec<User>,
    compartments: Vec<Compartment>,
    policies: Vec<Policy>,
    memberships: Vec<Membership>,
    ai_resources: Vec<(AiResourceKind, AiResource)>,
    pending_deletes: HashMap<String, u32>,
    deletion_lag: u32,
    failures: BTreeMap<String, u16>,
    journal: Vec<String>,
}

impl State {
    fn mint(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("ocid1.{kind}.mem..{:04}", self.next_id)
    }

    fn record(&mut self, call: String) -> CloudResult<()> {
        let failure = self.failures.remove(&call);
        self.journal.push(call.clone());
        match failure {
            Some(status) => Err(CloudError::service(call, status, "Injected", "injected failure")),
            None => Ok(()),
        }
    }

    fn user_name(&self, user_id: &str) -> String {
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| user.name.clone())
            .unwrap_or_else(|| user_id.to_string())
    }

    fn group_name(&self, group_id: &str) -> String {
        self.groups
            .iter()
            .find(|group| group.id == group_id)
            .map(|group| group.name.clone())
            .unwrap_or_else(|| group_id.to_string())
    }

    fn compartment_name(&self, compartment_id: &str) -> String {
        self.compartments
            .iter()
            .find(|compartment| compartment.id == compartment_id)
            .map(|compartment| compartment.name.clone())
            .unwrap_or_else(|| compartment_id.to_string())
    }

    /// Advance an in-flight deletion by one poll. `true` once it is gone.
    fn poll_pending(&mut self, id: &str) -> Option<bool> {
        let remaining = self.pending_deletes.get_mut(id)?;
        if *remaining == 0 {
            self.pending_deletes.remove(id);
            return Some(true);
        }
        *remaining -= 1;
        Some(false)
    }
}

pub struct InMemoryTenancy {
    tenancy_id: String,
    state: RefCell<State>,
}

impl InMemoryTenancy {
    pub fn new(tenancy_id: impl Into<String>) -> Self {
        Self {
            tenancy_id: tenancy_id.into(),
            state: RefCell::new(State::default()),
        }
    }

    pub fn tenancy_id(&self) -> &str {
        &self.tenancy_id
    }

    /// Number of `DELETING` polls before a deleted resource returns 404.
    pub fn set_deletion_lag(&self, polls: u32) {
        self.state.borrow_mut().deletion_lag = polls;
    }

    /// Fail the next call whose journal entry equals `call` with `status`.
    pub fn fail_next(&self, call: impl Into<String>, status: u16) {
        self.state.borrow_mut().failures.insert(call.into(), status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().journal.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.state
            .borrow()
            .journal
            .iter()
            .filter(|call| call.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn seed_group(&self, name: &str) -> Group {
        let mut state = self.state.borrow_mut();
        let group = Group {
            id: state.mint("group"),
            name: name.to_string(),
            description: String::new(),
        };
        state.groups.push(group.clone());
        group
    }

    pub fn seed_user(&self, name: &str) -> User {
        let mut state = self.state.borrow_mut();
        let user = User {
            id: state.mint("user"),
            name: name.to_string(),
            email: Some(name.to_string()),
            description: String::new(),
        };
        state.users.push(user.clone());
        user
    }

    pub fn seed_membership(&self, user_id: &str, group_id: &str) -> Membership {
        let mut state = self.state.borrow_mut();
        let membership = Membership {
            id: state.mint("groupmembership"),
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
        };
        state.memberships.push(membership.clone());
        membership
    }

    pub fn seed_compartment(&self, name: &str) -> Compartment {
        let mut state = self.state.borrow_mut();
        let compartment = Compartment {
            id: state.mint("compartment"),
            name: name.to_string(),
            parent_id: self.tenancy_id.clone(),
            lifecycle_state: LifecycleState::Active,
        };
        state.compartments.push(compartment.clone());
        compartment
    }

    pub fn seed_ai_resource(
        &self,
        kind: AiResourceKind,
        compartment_id: &str,
        display_name: &str,
    ) -> AiResource {
        let mut state = self.state.borrow_mut();
        let resource = AiResource {
            id: state.mint(kind.collection_path()),
            display_name: display_name.to_string(),
            compartment_id: compartment_id.to_string(),
            lifecycle_state: LifecycleState::Active,
        };
        state.ai_resources.push((kind, resource.clone()));
        resource
    }

    pub fn group_named(&self, name: &str) -> Option<Group> {
        self.state
            .borrow()
            .groups
            .iter()
            .find(|group| group.name == name)
            .cloned()
    }

    pub fn user_named(&self, name: &str) -> Option<User> {
        self.state
            .borrow()
            .users
            .iter()
            .find(|user| user.name == name)
            .cloned()
    }

    /// Compartment by name, in any lifecycle state still visible.
    pub fn compartment_named(&self, name: &str) -> Option<Compartment> {
        self.state
            .borrow()
            .compartments
            .iter()
            .find(|compartment| compartment.name == name)
            .cloned()
    }

    pub fn policy_named(&self, name: &str) -> Option<Policy> {
        self.state
            .borrow()
            .policies
            .iter()
            .find(|policy| policy.name == name)
            .cloned()
    }

    pub fn memberships(&self) -> Vec<Membership> {
        self.state.borrow().memberships.clone()
    }

    pub fn ai_resources(&self, compartment_id: &str) -> Vec<(AiResourceKind, AiResource)> {
        self.state
            .borrow()
            .ai_resources
            .iter()
            .filter(|(_, resource)| resource.compartment_id == compartment_id)
            .cloned()
            .collect()
    }
}

impl IdentityApi for InMemoryTenancy {
    fn list_groups(&self, compartment_id: &str) -> CloudResult<Vec<Group>> {
        let mut state = self.state.borrow_mut();
        state.record(format!("list_groups {compartment_id}"))?;
        Ok(state.groups.clone())
    }

    fn create_group(&self, details: &CreateGroupDetails) -> CloudResult<Group> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_group {}", details.name))?;
        if state.groups.iter().any(|group| group.name == details.name) {
            return Err(CloudError::service("create_group", 409, "Conflict", "group exists"));
        }
        let group = Group {
            id: state.mint("group"),
            name: details.name.clone(),
            description: details.description.clone(),
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    fn delete_group(&self, group_id: &str) -> CloudResult<()> {
        let mut state = self.state.borrow_mut();
        let name = state.group_name(group_id);
        state.record(format!("delete_group {name}"))?;
        if state.memberships.iter().any(|membership| membership.group_id == group_id) {
            return Err(CloudError::service("delete_group", 409, "Conflict", "group still has members"));
        }
        let before = state.groups.len();
        state.groups.retain(|group| group.id != group_id);
        if state.groups.len() == before {
            return Err(CloudError::not_found("delete_group", "group"));
        }
        Ok(())
    }

    fn list_users(&self, compartment_id: &str) -> CloudResult<Vec<User>> {
        let mut state = self.state.borrow_mut();
        state.record(format!("list_users {compartment_id}"))?;
        Ok(state.users.clone())
    }

    fn get_user(&self, user_id: &str) -> CloudResult<User> {
        let mut state = self.state.borrow_mut();
        let name = state.user_name(user_id);
        state.record(format!("get_user {name}"))?;
        state
            .users
            .iter()
            .find(|user| user.id == user_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("get_user", "user"))
    }

    fn create_user(&self, details: &CreateUserDetails) -> CloudResult<User> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_user {}", details.name))?;
        if state.users.iter().any(|user| user.name == details.name) {
            return Err(CloudError::service("create_user", 409, "Conflict", "user exists"));
        }
        let user = User {
            id: state.mint("user"),
            name: details.name.clone(),
            email: Some(details.email.clone()),
            description: details.description.clone(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    fn delete_user(&self, user_id: &str) -> CloudResult<()> {
        let mut state = self.state.borrow_mut();
        let name = state.user_name(user_id);
        state.record(format!("delete_user {name}"))?;
        if state.memberships.iter().any(|membership| membership.user_id == user_id) {
            return Err(CloudError::service("delete_user", 409, "Conflict", "user still in groups"));
        }
        let before = state.users.len();
        state.users.retain(|user| user.id != user_id);
        if state.users.len() == before {
            return Err(CloudError::not_found("delete_user", "user"));
        }
        Ok(())
    }

    fn list_active_compartments(&self, root_id: &str) -> CloudResult<Vec<Compartment>> {
        let mut state = self.state.borrow_mut();
        state.record(format!("list_compartments {root_id}"))?;
        Ok(state
            .compartments
            .iter()
            .filter(|compartment| compartment.lifecycle_state == LifecycleState::Active)
            .cloned()
            .collect())
    }

    fn get_compartment(&self, compartment_id: &str) -> CloudResult<Compartment> {
        let mut state = self.state.borrow_mut();
        let name = state.compartment_name(compartment_id);
        state.record(format!("get_compartment {name}"))?;
        if state.poll_pending(compartment_id) == Some(true) {
            state.compartments.retain(|compartment| compartment.id != compartment_id);
        }
        state
            .compartments
            .iter()
            .find(|compartment| compartment.id == compartment_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("get_compartment", "compartment"))
    }

    fn create_compartment(&self, details: &CreateCompartmentDetails) -> CloudResult<Compartment> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_compartment {}", details.name))?;
        if state.compartments.iter().any(|compartment| compartment.name == details.name) {
            return Err(CloudError::service("create_compartment", 409, "Conflict", "compartment exists"));
        }
        let compartment = Compartment {
            id: state.mint("compartment"),
            name: details.name.clone(),
            parent_id: details.compartment_id.clone(),
            lifecycle_state: LifecycleState::Active,
        };
        state.compartments.push(compartment.clone());
        Ok(compartment)
    }

    fn delete_compartment(&self, compartment_id: &str) -> CloudResult<()> {
        let mut state = self.state.borrow_mut();
        let name = state.compartment_name(compartment_id);
        state.record(format!("delete_compartment {name}"))?;
        if state
            .ai_resources
            .iter()
            .any(|(_, resource)| resource.compartment_id == compartment_id)
        {
            return Err(CloudError::service(
                "delete_compartment",
                409,
                "CompartmentNotEmpty",
                format!("compartment {name} still holds resources"),
            ));
        }
        let lag = state.deletion_lag;
        let Some(compartment) = state
            .compartments
            .iter_mut()
            .find(|compartment| compartment.id == compartment_id)
        else {
            return Err(CloudError::not_found("delete_compartment", "compartment"));
        };
        compartment.lifecycle_state = LifecycleState::Deleting;
        state.pending_deletes.insert(compartment_id.to_string(), lag);
        Ok(())
    }

    fn list_policies(&self, compartment_id: &str) -> CloudResult<Vec<Policy>> {
        let mut state = self.state.borrow_mut();
        state.record(format!("list_policies {compartment_id}"))?;
        Ok(state
            .policies
            .iter()
            .filter(|policy| policy.compartment_id == compartment_id)
            .cloned()
            .collect())
    }

    fn create_policy(&self, details: &CreatePolicyDetails) -> CloudResult<Policy> {
        let mut state = self.state.borrow_mut();
        state.record(format!("create_policy {}", details.name))?;
        let policy = Policy {
            id: state.mint("policy"),
            name: details.name.clone(),
            compartment_id: details.compartment_id.clone(),
            statements: details.statements.clone(),
        };
        state.policies.push(policy.clone());
        Ok(policy)
    }

    fn delete_policy(&self, policy_id: &str) -> CloudResult<()> {
        let mut state = self.state.borrow_mut();
        let name = state
            .policies
            .iter()
            .find(|policy| policy.id == policy_id)
            .map(|policy| policy.name.clone())
            .unwrap_or_else(|| policy_id.to_string());
        state.record(format!("delete_policy {name}"))?;
        let before = state.policies.len();
        state.policies.retain(|policy| policy.id != policy_id);
        if state.policies.len() == before {
            return Err(CloudError::not_found("delete_policy", "policy"));
        }
        Ok(())
    }

    fn list_memberships(
        &self,
        _compartment_id: &str,
        filter: &MembershipFilter,
    ) -> CloudResult<Vec<Membership>> {
        let mut state = self.state.borrow_mut();
        let subject = match filter {
            MembershipFilter::User(user_id) => state.user_name(user_id),
            MembershipFilter::Group(group_id) => state.group_name(group_id),
        };
        state.record(format!("list_memberships {subject}"))?;
        Ok(state
            .memberships
            .iter()
            .filter(|membership| match filter {
                MembershipFilter::User(user_id) => &membership.user_id == user_id,
                MembershipFilter::Group(group_id) => &membership.group_id == group_id,
            })
            .cloned()
            .collect())
    }

    fn add_user_to_group(&self, user_id: &str, group_id: &str) -> CloudResult<Membership> {
        let mut state = self.state.borrow_mut();
        let call = format!(
            "add_user_to_group {} {}",
            state.user_name(user_id),
            state.group_name(group_id)
        );
        state.record(call)?;
        if state
            .memberships
            .iter()
            .any(|membership| membership.user_id == user_id && membership.group_id == group_id)
        {
            return Err(CloudError::service(
                "add_user_to_group",
                409,
                "RelationshipAlreadyExists",
                "user is already a member",
            ));
        }
        let membership = Membership {
            id: state.mint("groupmembership"),
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
        };
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    fn remove_user_from_group(&self, membership_id: &str) -> CloudResult<()> {
        let mut state = self.state.borrow_mut();
        let call = match state
            .memberships
            .iter()
            .find(|membership| membership.id == membership_id)
            .cloned()
        {
            Some(membership) => format!(
                "remove_user_from_group {} {}",
                state.user_name(&membership.user_id),
                state.group_name(&membership.group_id)
            ),
            None => format!("remove_user_from_group {membership_id}"),
        };
        state.record(call)?;
        let before = state.memberships.len();
        state.memberships.retain(|membership| membership.id != membership_id);
        if state.memberships.len() == before {
            return Err(CloudError::not_found("remove_user_from_group", "membership"));
        }
        Ok(())
    }
}

impl AgentApi for InMemoryTenancy {
    fn list(&self, kind: AiResourceKind, compartment_id: &str) -> CloudResult<Vec<AiResource>> {
        let mut state = self.state.borrow_mut();
        let name = state.compartment_name(compartment_id);
        state.record(format!("list_{} {name}", kind.collection_path()))?;
        Ok(state
            .ai_resources
            .iter()
            .filter(|(entry_kind, resource)| {
                *entry_kind == kind
                    && resource.compartment_id == compartment_id
                    && resource.lifecycle_state != LifecycleState::Deleting
            })
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    fn get(&self, kind: AiResourceKind, id: &str) -> CloudResult<AiResource> {
        let mut state = self.state.borrow_mut();
        let name = display_name(&state, id);
        state.record(format!("get_{} {name}", kind.collection_path()))?;
        if state.poll_pending(id) == Some(true) {
            state.ai_resources.retain(|(_, resource)| resource.id != id);
        }
        state
            .ai_resources
            .iter()
            .find(|(entry_kind, resource)| *entry_kind == kind && resource.id == id)
            .map(|(_, resource)| resource.clone())
            .ok_or_else(|| CloudError::not_found(format!("get_{}", kind.collection_path()), kind.label()))
    }

    fn delete(&self, kind: AiResourceKind, id: &str) -> CloudResult<()> {
        let mut state = self.state.borrow_mut();
        let name = display_name(&state, id);
        state.record(format!("delete_{} {name}", kind.collection_path()))?;
        let Some(compartment_id) = state
            .ai_resources
            .iter()
            .find(|(entry_kind, resource)| *entry_kind == kind && resource.id == id)
            .map(|(_, resource)| resource.compartment_id.clone())
        else {
            return Err(CloudError::not_found(
                format!("delete_{}", kind.collection_path()),
                kind.label(),
            ));
        };
        if kind == AiResourceKind::Agent
            && state.ai_resources.iter().any(|(entry_kind, resource)| {
                *entry_kind == AiResourceKind::Endpoint && resource.compartment_id == compartment_id
            })
        {
            return Err(CloudError::service(
                "delete_agents",
                409,
                "Conflict",
                "agent still has endpoints",
            ));
        }
        let lag = state.deletion_lag;
        if let Some((_, resource)) = state
            .ai_resources
            .iter_mut()
            .find(|(entry_kind, resource)| *entry_kind == kind && resource.id == id)
        {
            resource.lifecycle_state = LifecycleState::Deleting;
        }
        state.pending_deletes.insert(id.to_string(), lag);
        Ok(())
    }
}

fn display_name(state: &State, id: &str) -> String {
    state
        .ai_resources
        .iter()
        .find(|(_, resource)| resource.id == id)
        .map(|(_, resource)| resource.display_name.clone())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compartment_deletion_reports_deleting_then_404() {
        let tenancy = InMemoryTenancy::new("root");
        tenancy.set_deletion_lag(1);
        let compartment = tenancy.seed_compartment("bobCompartment");
        tenancy.delete_compartment(&compartment.id).unwrap();

        let first = tenancy.get_compartment(&compartment.id).unwrap();
        assert_eq!(first.lifecycle_state, LifecycleState::Deleting);
        assert!(tenancy.get_compartment(&compartment.id).unwrap_err().is_not_found());
        assert!(tenancy.list_active_compartments("root").unwrap().is_empty());
    }

    #[test]
    fn compartments_with_resources_refuse_deletion() {
        let tenancy = InMemoryTenancy::new("root");
        let compartment = tenancy.seed_compartment("bobCompartment");
        tenancy.seed_ai_resource(AiResourceKind::Tool, &compartment.id, "search");
        let err = tenancy.delete_compartment(&compartment.id).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn groups_with_members_refuse_deletion() {
        let tenancy = InMemoryTenancy::new("root");
        let group = tenancy.seed_group("Lab1");
        let user = tenancy.seed_user("bob@example.com");
        let membership = tenancy.seed_membership(&user.id, &group.id);
        assert!(tenancy.delete_group(&group.id).unwrap_err().is_conflict());

        tenancy.remove_user_from_group(&membership.id).unwrap();
        tenancy.delete_group(&group.id).unwrap();
    }

    #[test]
    fn injected_failures_fire_once() {
        let tenancy = InMemoryTenancy::new("root");
        tenancy.fail_next("list_groups root", 503);
        assert_eq!(tenancy.list_groups("root").unwrap_err().status(), Some(503));
        assert!(tenancy.list_groups("root").unwrap().is_empty());
        assert_eq!(tenancy.calls(), vec!["list_groups root", "list_groups root"]);
    }
}
