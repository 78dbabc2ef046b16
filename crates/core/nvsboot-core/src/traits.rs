//! Core traits shared across nvsboot crates.

use crate::NvsbootResult;

/// Trait for objects that can be validated
pub trait Validatable {
    /// Validate this object
    fn validate(&self) -> NvsbootResult<()>;

    /// Check if this object is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NvsbootError;

    struct Label(&'static str);

    impl Validatable for Label {
        fn validate(&self) -> NvsbootResult<()> {
            if self.0.is_empty() {
                return Err(NvsbootError::invalid_input("empty label"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_is_valid_follows_validate() {
        assert!(Label("nvs").is_valid());
        assert!(!Label("").is_valid());
    }
}
