//! The error taxonomy for building and solving energy hub models.
//!
//! Most functions in this crate return [`anyhow::Result`]. Where a caller needs to react to a
//! particular kind of failure (e.g. the orchestrator skipping an infeasible Pareto step), a
//! [`HubError`] is raised and can be recovered with [`anyhow::Error::downcast_ref`].
use std::error::Error;
use std::fmt;

/// Errors which can occur while configuring, building or solving a model
#[derive(Debug, Clone, PartialEq)]
pub enum HubError {
    /// An unsupported mode was requested or the inputs are inconsistent
    Configuration(String),
    /// A required parameter is absent. The payload names the key.
    MissingParameter(String),
    /// The solver proved that no feasible point exists
    InfeasibleModel,
    /// The objective is unbounded (usually a sign or unit error in the parameters)
    UnboundedModel,
    /// The solver crashed or returned a status we don't recognise
    Solver(String),
}

impl HubError {
    /// Whether this error only affects a single model instance.
    ///
    /// Such errors are recorded by the orchestrator, which then moves on to the next instance.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HubError::InfeasibleModel)
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            HubError::MissingParameter(key) => write!(f, "Missing required parameter: {key}"),
            HubError::InfeasibleModel => write!(f, "The model is infeasible"),
            HubError::UnboundedModel => write!(f, "The objective is unbounded"),
            HubError::Solver(msg) => write!(f, "Solver error: {msg}"),
        }
    }
}

impl Error for HubError {}

/// Check whether an [`anyhow::Error`] wraps the given kind of [`HubError`]
pub fn is_hub_error(err: &anyhow::Error, predicate: impl Fn(&HubError) -> bool) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<HubError>())
        .any(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_display() {
        assert_eq!(
            HubError::MissingParameter("carriers".into()).to_string(),
            "Missing required parameter: carriers"
        );
        assert_eq!(
            HubError::Configuration("bad mode".into()).to_string(),
            "Configuration error: bad mode"
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(HubError::InfeasibleModel.is_recoverable());
        assert!(!HubError::UnboundedModel.is_recoverable());
        assert!(!HubError::Solver("crash".into()).is_recoverable());
    }

    #[test]
    fn test_is_hub_error_through_context() {
        let err: anyhow::Result<()> = Err(HubError::InfeasibleModel).context("Solving step 2");
        let err = err.unwrap_err();
        assert!(is_hub_error(&err, |e| *e == HubError::InfeasibleModel));
        assert!(!is_hub_error(&err, |e| *e == HubError::UnboundedModel));
    }
}
