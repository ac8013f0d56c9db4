//! Naming rules shared by lab setup and teardown.
//!
//! Teardown rebuilds compartment and policy names from the live group
//! membership, so every derived name must come from the functions in this
//! module and nowhere else.

pub const MAX_NAME_LEN: usize = 100;
pub const COMPARTMENT_SUFFIX: &str = "Compartment";

const BASE_POLICY_SUFFIX: &str = "BasePolicy";

/// Permissions every lab group receives at tenancy scope.
const TENANCY_GRANTS: &[&str] = &[
    "use cloud-shell",
    "use cloud-shell-public-network",
    "manage object-family",
    "manage buckets",
    "manage objects",
    "use generative-ai-family",
    "manage adm-knowledge-bases",
    "manage genai-agent-family",
];

#[inline]
fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | ';' | '+')
}

#[inline]
fn is_compartment_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | ';')
}

#[inline]
fn is_username_char(ch: char) -> bool {
    is_name_char(ch) || ch == '@'
}

/// Accepts 1..=100 characters drawn from `a-z A-Z 0-9 . - _ ; +`.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return false;
    }
    name.chars().all(is_name_char)
}

/// Compartment owned by the user with this email, e.g.
/// `alice+test@example.com` becomes `alice_testCompartment`.
pub fn compartment_name_for(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut name: String = local
        .replace('+', "_")
        .chars()
        .filter(|ch| is_compartment_char(*ch))
        .collect();
    name.push_str(COMPARTMENT_SUFFIX);
    name
}

/// Username for an email address. The full address is kept, `@` and `+`
/// included; anything else outside the name alphabet is dropped.
pub fn username_for(email: &str) -> String {
    email.chars().filter(|ch| is_username_char(*ch)).collect()
}

/// Usernames are validated with their `@` removed, since the validator
/// alphabet has no `@`.
pub fn is_valid_username(username: &str) -> bool {
    is_valid_name(&username.replace('@', ""))
}

pub fn base_policy_name(lab: &str) -> String {
    format!("{lab}-{BASE_POLICY_SUFFIX}")
}

pub fn user_policy_name(lab: &str, compartment: &str) -> String {
    format!("{lab}-{compartment}-Policy")
}

pub fn compartment_statement(lab: &str, compartment: &str) -> String {
    format!("allow group '{lab}' to manage all-resources in compartment {compartment}")
}

/// Tenancy grants for the lab group followed by one `manage all-resources`
/// statement per compartment, in the order given.
pub fn base_policy_statements<S: AsRef<str>>(lab: &str, compartments: &[S]) -> Vec<String> {
    let mut statements: Vec<String> = TENANCY_GRANTS
        .iter()
        .map(|grant| format!("allow group '{lab}' to {grant} in tenancy"))
        .collect();
    statements.extend(
        compartments
            .iter()
            .map(|compartment| compartment_statement(lab, compartment.as_ref())),
    );
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_accepts_and_rejects() {
        assert!(is_valid_name("lab1.group-1"));
        assert!(is_valid_name("a;b+c_d"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("lab group"));
        assert!(!is_valid_name("lab@group"));
        assert!(is_valid_name(&"x".repeat(100)));
        assert!(!is_valid_name(&"x".repeat(101)));
    }

    #[test]
    fn compartment_names_follow_email_local_part() {
        assert_eq!(
            compartment_name_for("alice+test@example.com"),
            "alice_testCompartment"
        );
        assert_eq!(compartment_name_for("bob@example.com"), "bobCompartment");
        assert_eq!(
            compartment_name_for("o'neil!x@example.com"),
            "oneilxCompartment"
        );
        assert_eq!(compartment_name_for("plain"), "plainCompartment");
    }

    #[test]
    fn compartment_name_is_deterministic() {
        let first = compartment_name_for("alice+test@example.com");
        let second = compartment_name_for("alice+test@example.com");
        assert_eq!(first, second);
    }

    #[test]
    fn usernames_keep_full_address() {
        assert_eq!(username_for("alice+test@example.com"), "alice+test@example.com");
        assert_eq!(username_for(" bob <bob@example.com>"), "bobbob@example.com");
        assert!(is_valid_username("alice+test@example.com"));
        assert!(!is_valid_username("@"));
    }

    #[test]
    fn policy_names_and_statements() {
        assert_eq!(base_policy_name("Lab1"), "Lab1-BasePolicy");
        assert_eq!(
            user_policy_name("Lab1", "bobCompartment"),
            "Lab1-bobCompartment-Policy"
        );
        let statements = base_policy_statements("Lab1", &["bobCompartment"]);
        assert_eq!(statements.len(), TENANCY_GRANTS.len() + 1);
        assert_eq!(
            statements[0],
            "allow group 'Lab1' to use cloud-shell in tenancy"
        );
        assert_eq!(
            statements.last().map(String::as_str),
            Some("allow group 'Lab1' to manage all-resources in compartment bobCompartment")
        );
    }
}
