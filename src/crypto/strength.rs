//! Password strength hinting
//!
//! A length plus character-class heuristic shown next to the password
//! prompt. It never blocks an export.

use std::fmt;

/// Coarse password strength rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
}

impl PasswordStrength {
    /// Rate a password by length and character-class diversity
    pub fn assess(password: &str) -> Self {
        let length = password.chars().count();
        if length < 8 {
            return Self::Weak;
        }

        let classes = [
            password.chars().any(|c| c.is_lowercase()),
            password.chars().any(|c| c.is_uppercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_alphanumeric()),
        ]
        .iter()
        .filter(|present| **present)
        .count();

        match (length, classes) {
            (12.., 3..) => Self::Strong,
            (10.., 2..) => Self::Good,
            (_, 2..) => Self::Fair,
            _ => Self::Weak,
        }
    }
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Weak => "weak",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Strong => "strong",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_is_weak() {
        assert_eq!(PasswordStrength::assess("Ab1!"), PasswordStrength::Weak);
        assert_eq!(PasswordStrength::assess(""), PasswordStrength::Weak);
    }

    #[test]
    fn test_single_class_is_weak() {
        assert_eq!(
            PasswordStrength::assess("abcdefghijklmnop"),
            PasswordStrength::Weak
        );
    }

    #[test]
    fn test_fair_good_strong() {
        assert_eq!(PasswordStrength::assess("abcdefg1"), PasswordStrength::Fair);
        assert_eq!(PasswordStrength::assess("abcdefghi1"), PasswordStrength::Good);
        assert_eq!(
            PasswordStrength::assess("Abcdefghij12"),
            PasswordStrength::Strong
        );
    }

    #[test]
    fn test_long_two_classes_is_good() {
        assert_eq!(
            PasswordStrength::assess("quartzcalcite2024"),
            PasswordStrength::Good
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PasswordStrength::Strong.to_string(), "strong");
    }
}
