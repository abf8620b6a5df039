//! Request validation run before anything is sent

use crate::client::error::ClientError;
use crate::types::{LoginRequest, NewSkill, QuizAnswer, RegisterRequest, Scenario};

/// Trait for validating request bodies
pub trait Validate {
    /// Returns `ClientError::Validation` describing the first violation
    fn validate(&self) -> Result<(), ClientError>;
}

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_TIMEFRAME_MONTHS: u32 = 24;

/// Syntactic email check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn check_email(email: &str) -> Result<(), ClientError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ClientError::invalid_input("Please enter a valid email address"))
    }
}

fn check_password(password: &str) -> Result<(), ClientError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ClientError::invalid_input(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )))
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ClientError> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().chars().count() < 2 {
            return Err(ClientError::invalid_input(
                "Name must be at least 2 characters",
            ));
        }
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

impl Validate for NewSkill {
    fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::invalid_input("Skill name is required"));
        }
        if self.category.trim().is_empty() {
            return Err(ClientError::invalid_input("Category is required"));
        }
        if self.level > 100 {
            return Err(ClientError::invalid_input("Level must be between 0 and 100"));
        }
        Ok(())
    }
}

impl Validate for Scenario {
    fn validate(&self) -> Result<(), ClientError> {
        if self.skills_to_learn.is_empty() {
            return Err(ClientError::invalid_input("Select at least one skill"));
        }
        match self.timeframe {
            0 => Err(ClientError::invalid_input(
                "Timeframe must be at least 1 month",
            )),
            t if t > MAX_TIMEFRAME_MONTHS => Err(ClientError::invalid_input(format!(
                "Timeframe cannot exceed {MAX_TIMEFRAME_MONTHS} months"
            ))),
            _ => Ok(()),
        }
    }
}

impl Validate for QuizAnswer {
    fn validate(&self) -> Result<(), ClientError> {
        if self.answer > 3 {
            return Err(ClientError::invalid_input("Answer must be one of the four options"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn emails() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@@b.com"));
        assert!(!is_valid_email("a@.com"));
    }

    #[test]
    fn login_rules() {
        assert!(login("a@b.com", "password123").validate().is_ok());
        let err = login("a@b.com", "short").validate().unwrap_err();
        assert!(matches!(err, ClientError::Validation { status: None, .. }));
        assert!(login("nope", "password123").validate().is_err());
    }

    #[test]
    fn scenario_timeframe_bounds() {
        let mut scenario = Scenario {
            skills_to_learn: vec!["Rust".into()],
            target_role: None,
            timeframe: 24,
        };
        assert!(scenario.validate().is_ok());
        scenario.timeframe = 25;
        assert!(scenario.validate().is_err());
        scenario.timeframe = 0;
        assert!(scenario.validate().is_err());
        scenario.timeframe = 6;
        scenario.skills_to_learn.clear();
        assert!(scenario.validate().is_err());
    }
}
