//! Input validation (§7 `Validation`): names, commit ids, branch names,
//! emails, and licence identifiers rejected before they ever reach a job.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::DispatchError;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn owner_or_db_name(value: &str) -> Result<(), DispatchError> {
    if NAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(DispatchError::Validation(format!("invalid name: {value}")))
    }
}

pub fn commit_id(value: &str) -> Result<(), DispatchError> {
    if value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(DispatchError::Validation(format!("invalid commit id: {value}")))
    }
}

pub fn branch_name(value: &str) -> Result<(), DispatchError> {
    owner_or_db_name(value)
}

pub fn email(value: &str) -> Result<(), DispatchError> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(DispatchError::Validation(format!("invalid email: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        assert!(owner_or_db_name("alice").is_ok());
        assert!(owner_or_db_name("my-db_1.2").is_ok());
    }

    #[test]
    fn rejects_empty_and_slashed_names() {
        assert!(owner_or_db_name("").is_err());
        assert!(owner_or_db_name("a/b").is_err());
    }

    #[test]
    fn validates_commit_id_length_and_case() {
        assert!(commit_id(&"a".repeat(64)).is_ok());
        assert!(commit_id(&"A".repeat(64)).is_err());
        assert!(commit_id("short").is_err());
    }

    #[test]
    fn validates_email_shape() {
        assert!(email("a@example.com").is_ok());
        assert!(email("not-an-email").is_err());
    }
}
