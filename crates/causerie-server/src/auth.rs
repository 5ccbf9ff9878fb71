//! Credential check against the compiled-in user table.

/// Static user database. Passwords are compared as opaque bytes; there is
/// no hashing and no constant-time guarantee.
const USERS: &[(&str, &str)] = &[
    ("jill", "eW94dsol"),
    ("jack", "432wlFd"),
    ("alice", "12345"),
    ("bob", "qwerty"),
];

pub fn authenticate(username: &str, password: &str) -> bool {
    USERS
        .iter()
        .any(|(user, pass)| *user == username && pass.as_bytes() == password.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_credentials_pass() {
        assert!(authenticate("alice", "12345"));
        assert!(authenticate("jill", "eW94dsol"));
    }

    #[test]
    fn wrong_password_fails() {
        assert!(!authenticate("alice", "wrong"));
        assert!(!authenticate("alice", ""));
    }

    #[test]
    fn unknown_user_fails() {
        assert!(!authenticate("mallory", "12345"));
        assert!(!authenticate("", ""));
    }
}
