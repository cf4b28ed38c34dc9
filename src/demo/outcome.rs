use crate::error::{Error, Result};

/// How a demo step ended.
///
/// `Complete(vec![])` means the step ran and found nothing, which is not the
/// same as `Failed`.
#[derive(Debug)]
pub enum Outcome<T> {
    Complete(T),
    /// The step produced something but some of its parts failed.
    Partial { value: T, errors: Vec<Error> },
    Failed(Error),
}

impl<T> Outcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Complete(value) | Outcome::Partial { value, .. } => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    pub fn errors(&self) -> Vec<&Error> {
        match self {
            Outcome::Complete(_) => Vec::new(),
            Outcome::Partial { errors, .. } => errors.iter().collect(),
            Outcome::Failed(error) => vec![error],
        }
    }

    /// Keeps whatever value the step produced and drops partial errors.
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Complete(value) | Outcome::Partial { value, .. } => Ok(value),
            Outcome::Failed(error) => Err(error),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Complete(value),
            Err(error) => Outcome::Failed(error),
        }
    }
}
