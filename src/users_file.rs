use std::path::Path;

use anyhow::Context;

use crate::names;

pub const DEFAULT_USERS_FILE: &str = "users.txt";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserList {
    /// Sanitized usernames, first occurrence order, without duplicates.
    pub accepted: Vec<String>,
    /// Raw lines that failed validation.
    pub skipped: Vec<String>,
}

pub fn read_users(path: &Path) -> anyhow::Result<UserList> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read users file {}", path.display()))?;
    Ok(parse_users(&contents))
}

/// One email per line; blank lines are ignored.
pub fn parse_users(contents: &str) -> UserList {
    let mut list = UserList::default();
    for line in contents.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let username = names::username_for(line);
        if !names::is_valid_username(&username) {
            println!("Skipping invalid username: {line}");
            list.skipped.push(line.to_string());
            continue;
        }
        if !list.accepted.contains(&username) {
            list.accepted.push(username);
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_filters_lines() {
        let list = parse_users("bob@example.com\n\n  alice+test@example.com  \n@@@\nbob@example.com\n");
        assert_eq!(list.accepted, vec!["bob@example.com", "alice+test@example.com"]);
        assert_eq!(list.skipped, vec!["@@@"]);
    }

    #[test]
    fn strips_characters_outside_the_alphabet() {
        let list = parse_users("<carol@example.com>\n");
        assert_eq!(list.accepted, vec!["carol@example.com"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_users(&dir.path().join("users.txt")).unwrap_err();
        assert!(err.to_string().contains("users.txt"));
    }
}
