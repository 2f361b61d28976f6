//! Ordered collection of per-condition failures

use std::fmt;

/// Errors collected from one evaluation, keyed by the name of the failing condition.
///
/// Entries keep the order in which conditions were evaluated so the combined
/// message is deterministic.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<(String, anyhow::Error)>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the failure of the named condition
    pub fn push(&mut self, name: impl Into<String>, error: anyhow::Error) {
        self.errors.push((name.into(), error));
    }

    /// True when no condition failed
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Names of the failing conditions, in evaluation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &anyhow::Error)> {
        self.errors.iter().map(|(name, err)| (name.as_str(), err))
    }

    /// Collapse into a single result: `Ok(())` when empty, `Err(self)` otherwise
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, err)) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {:#}", name, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_multi_error() {
        let errors = MultiError::new();
        assert!(errors.is_empty());
        assert_eq!(errors.to_string(), "");
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_combined_message_keeps_order() {
        let mut errors = MultiError::new();
        errors.push("build", anyhow::anyhow!("timeout"));
        errors.push("user", anyhow::anyhow!("connection refused"));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.names().collect::<Vec<_>>(), vec!["build", "user"]);
        assert_eq!(
            errors.to_string(),
            "build: timeout; user: connection refused"
        );
        assert!(errors.into_result().is_err());
    }
}
