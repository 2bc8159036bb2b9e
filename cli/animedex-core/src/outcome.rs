/// The state of the most recent request for a `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Loading,
    Failed(String),
    Succeeded(T),
}

impl<T> FetchOutcome<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchOutcome::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }
}

/// Whether a finished request was applied to state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer request superseded this one; its result was dropped.
    Stale,
}
