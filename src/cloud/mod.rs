//! Control-plane model and the two service seams the lab procedures talk to.
//!
//! [`IdentityApi`] covers groups, users, compartments, policies and group
//! memberships. [`AgentApi`] covers the generative-AI agent family that lab
//! users create inside their compartments. Both have an HTTP implementation
//! ([`identity::IdentityClient`], [`agents::AgentClient`]). The in-process
//! `memory::InMemoryTenancy` is compiled for tests and the `testing` feature.

pub mod agents;
mod error;
mod http;
pub mod identity;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod signer;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::{CloudError, CloudResult};
pub use http::{HttpTransport, RetryPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Creating,
    Active,
    Inactive,
    Updating,
    Deleting,
    Deleted,
    Failed,
    #[serde(other)]
    Unknown,
}

impl LifecycleState {
    pub fn is_deleted(self) -> bool {
        matches!(self, LifecycleState::Deleted)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compartment {
    pub id: String,
    pub name: String,
    #[serde(rename = "compartmentId")]
    pub parent_id: String,
    pub lifecycle_state: LifecycleState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub compartment_id: String,
    #[serde(default)]
    pub statements: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupDetails {
    pub compartment_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserDetails {
    pub compartment_id: String,
    pub name: String,
    pub description: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompartmentDetails {
    pub compartment_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyDetails {
    pub compartment_id: String,
    pub name: String,
    pub description: String,
    pub statements: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipFilter {
    User(String),
    Group(String),
}

/// Agent-family resource kinds, in the order a compartment must be emptied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AiResourceKind {
    Endpoint,
    Tool,
    KnowledgeBase,
    Agent,
}

impl AiResourceKind {
    pub const TEARDOWN_ORDER: [AiResourceKind; 4] = [
        AiResourceKind::Endpoint,
        AiResourceKind::Tool,
        AiResourceKind::KnowledgeBase,
        AiResourceKind::Agent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AiResourceKind::Endpoint => "Endpoint",
            AiResourceKind::Tool => "Tool",
            AiResourceKind::KnowledgeBase => "Knowledge Base",
            AiResourceKind::Agent => "Agent",
        }
    }

    pub fn collection_path(self) -> &'static str {
        match self {
            AiResourceKind::Endpoint => "agentEndpoints",
            AiResourceKind::Tool => "tools",
            AiResourceKind::KnowledgeBase => "knowledgeBases",
            AiResourceKind::Agent => "agents",
        }
    }
}

impl fmt::Display for AiResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResource {
    pub id: String,
    pub display_name: String,
    pub compartment_id: String,
    pub lifecycle_state: LifecycleState,
}

pub trait IdentityApi {
    fn list_groups(&self, compartment_id: &str) -> CloudResult<Vec<Group>>;
    fn create_group(&self, details: &CreateGroupDetails) -> CloudResult<Group>;
    fn delete_group(&self, group_id: &str) -> CloudResult<()>;

    fn list_users(&self, compartment_id: &str) -> CloudResult<Vec<User>>;
    fn get_user(&self, user_id: &str) -> CloudResult<User>;
    fn create_user(&self, details: &CreateUserDetails) -> CloudResult<User>;
    fn delete_user(&self, user_id: &str) -> CloudResult<()>;

    /// Active compartments anywhere below `root_id`.
    fn list_active_compartments(&self, root_id: &str) -> CloudResult<Vec<Compartment>>;
    fn get_compartment(&self, compartment_id: &str) -> CloudResult<Compartment>;
    fn create_compartment(&self, details: &CreateCompartmentDetails) -> CloudResult<Compartment>;
    fn delete_compartment(&self, compartment_id: &str) -> CloudResult<()>;

    fn list_policies(&self, compartment_id: &str) -> CloudResult<Vec<Policy>>;
    fn create_policy(&self, details: &CreatePolicyDetails) -> CloudResult<Policy>;
    fn delete_policy(&self, policy_id: &str) -> CloudResult<()>;

    fn list_memberships(
        &self,
        compartment_id: &str,
        filter: &MembershipFilter,
    ) -> CloudResult<Vec<Membership>>;
    fn add_user_to_group(&self, user_id: &str, group_id: &str) -> CloudResult<Membership>;
    fn remove_user_from_group(&self, membership_id: &str) -> CloudResult<()>;
}

pub trait AgentApi {
    fn list(&self, kind: AiResourceKind, compartment_id: &str) -> CloudResult<Vec<AiResource>>;
    fn get(&self, kind: AiResourceKind, id: &str) -> CloudResult<AiResource>;
    fn delete(&self, kind: AiResourceKind, id: &str) -> CloudResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_identity_payloads() {
        let raw = r#"{
            "id": "ocid1.compartment.oc1..aaa",
            "name": "bobCompartment",
            "compartmentId": "ocid1.tenancy.oc1..root",
            "lifecycleState": "ACTIVE",
            "timeCreated": "2026-01-01T00:00:00.000Z"
        }"#;
        let compartment: Compartment = serde_json::from_str(raw).unwrap();
        assert_eq!(compartment.parent_id, "ocid1.tenancy.oc1..root");
        assert_eq!(compartment.lifecycle_state, LifecycleState::Active);

        let membership: Membership = serde_json::from_str(
            r#"{"id":"m1","userId":"u1","groupId":"g1","inactiveStatus":null}"#,
        )
        .unwrap();
        assert_eq!(membership.user_id, "u1");
    }

    #[test]
    fn unknown_lifecycle_state_is_tolerated() {
        let resource: AiResource = serde_json::from_str(
            r#"{"id":"a1","displayName":"helper","compartmentId":"c1","lifecycleState":"NEEDS_ATTENTION"}"#,
        )
        .unwrap();
        assert_eq!(resource.lifecycle_state, LifecycleState::Unknown);
    }

    #[test]
    fn create_details_serialize_camel_case() {
        let details = CreatePolicyDetails {
            compartment_id: "root".to_string(),
            name: "Lab1-BasePolicy".to_string(),
            description: "Policy for Lab1-BasePolicy".to_string(),
            statements: vec!["allow group 'Lab1' to use cloud-shell in tenancy".to_string()],
        };
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["compartmentId"], "root");
        assert_eq!(value["statements"][0], "allow group 'Lab1' to use cloud-shell in tenancy");
    }
}
