use serde::Serialize;

use super::http::encode_segment;
use super::{
    CloudResult, Compartment, CreateCompartmentDetails, CreateGroupDetails, CreatePolicyDetails,
    CreateUserDetails, Group, HttpTransport, IdentityApi, Membership, MembershipFilter, Policy,
    User,
};

const API: &str = "/20160918";
const PAGE_LIMIT: &str = "1000";

pub fn default_endpoint(region: &str) -> String {
    format!("https://identity.{region}.oci.oraclecloud.com")
}

/// Identity and access management over the OCI REST API.
pub struct IdentityClient {
    transport: HttpTransport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddUserToGroupDetails<'a> {
    user_id: &'a str,
    group_id: &'a str,
}

impl IdentityClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    fn collection(name: &str) -> String {
        format!("{API}/{name}")
    }

    fn item(name: &str, id: &str) -> String {
        format!("{API}/{name}/{}", encode_segment(id))
    }
}

impl IdentityApi for IdentityClient {
    fn list_groups(&self, compartment_id: &str) -> CloudResult<Vec<Group>> {
        self.transport.list_all(
            "list_groups",
            &Self::collection("groups"),
            &[("compartmentId", compartment_id), ("limit", PAGE_LIMIT)],
        )
    }

    fn create_group(&self, details: &CreateGroupDetails) -> CloudResult<Group> {
        self.transport
            .post_json("create_group", &Self::collection("groups"), details)
    }

    fn delete_group(&self, group_id: &str) -> CloudResult<()> {
        self.transport
            .delete("delete_group", &Self::item("groups", group_id))
    }

    fn list_users(&self, compartment_id: &str) -> CloudResult<Vec<User>> {
        self.transport.list_all(
            "list_users",
            &Self::collection("users"),
            &[("compartmentId", compartment_id), ("limit", PAGE_LIMIT)],
        )
    }

    fn get_user(&self, user_id: &str) -> CloudResult<User> {
        self.transport
            .get_json("get_user", &Self::item("users", user_id), &[])
    }

    fn create_user(&self, details: &CreateUserDetails) -> CloudResult<User> {
        self.transport
            .post_json("create_user", &Self::collection("users"), details)
    }

    fn delete_user(&self, user_id: &str) -> CloudResult<()> {
        self.transport
            .delete("delete_user", &Self::item("users", user_id))
    }

    fn list_active_compartments(&self, root_id: &str) -> CloudResult<Vec<Compartment>> {
        self.transport.list_all(
            "list_compartments",
            &Self::collection("compartments"),
            &[
                ("compartmentId", root_id),
                ("compartmentIdInSubtree", "true"),
                ("accessLevel", "ANY"),
                ("lifecycleState", "ACTIVE"),
                ("limit", PAGE_LIMIT),
            ],
        )
    }

    fn get_compartment(&self, compartment_id: &str) -> CloudResult<Compartment> {
        self.transport.get_json(
            "get_compartment",
            &Self::item("compartments", compartment_id),
            &[],
        )
    }

    fn create_compartment(&self, details: &CreateCompartmentDetails) -> CloudResult<Compartment> {
        self.transport.post_json(
            "create_compartment",
            &Self::collection("compartments"),
            details,
        )
    }

    fn delete_compartment(&self, compartment_id: &str) -> CloudResult<()> {
        self.transport.delete(
            "delete_compartment",
            &Self::item("compartments", compartment_id),
        )
    }

    fn list_policies(&self, compartment_id: &str) -> CloudResult<Vec<Policy>> {
        self.transport.list_all(
            "list_policies",
            &Self::collection("policies"),
            &[("compartmentId", compartment_id), ("limit", PAGE_LIMIT)],
        )
    }

    fn create_policy(&self, details: &CreatePolicyDetails) -> CloudResult<Policy> {
        self.transport
            .post_json("create_policy", &Self::collection("policies"), details)
    }

    fn delete_policy(&self, policy_id: &str) -> CloudResult<()> {
        self.transport
            .delete("delete_policy", &Self::item("policies", policy_id))
    }

    fn list_memberships(
        &self,
        compartment_id: &str,
        filter: &MembershipFilter,
    ) -> CloudResult<Vec<Membership>> {
        let (key, value) = match filter {
            MembershipFilter::User(user_id) => ("userId", user_id.as_str()),
            MembershipFilter::Group(group_id) => ("groupId", group_id.as_str()),
        };
        self.transport.list_all(
            "list_user_group_memberships",
            &Self::collection("userGroupMemberships"),
            &[
                ("compartmentId", compartment_id),
                (key, value),
                ("limit", PAGE_LIMIT),
            ],
        )
    }

    fn add_user_to_group(&self, user_id: &str, group_id: &str) -> CloudResult<Membership> {
        self.transport.post_json(
            "add_user_to_group",
            &Self::collection("userGroupMemberships"),
            &AddUserToGroupDetails { user_id, group_id },
        )
    }

    fn remove_user_from_group(&self, membership_id: &str) -> CloudResult<()> {
        self.transport.delete(
            "remove_user_from_group",
            &Self::item("userGroupMemberships", membership_id),
        )
    }
}
