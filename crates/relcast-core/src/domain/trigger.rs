//! Trigger events that start a release run.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{ReleaseError, ReleaseResult};

/// Kind of release requested through a manual dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Nightly,
    Test,
}

impl ReleaseType {
    /// Lowercase identifier used in tag names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Nightly => "nightly",
            ReleaseType::Test => "test",
        }
    }

    /// Capitalized form used in release display names.
    pub fn display_name(&self) -> &'static str {
        match self {
            ReleaseType::Nightly => "Nightly",
            ReleaseType::Test => "Test",
        }
    }
}

impl std::fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = ReleaseError;

    fn from_str(s: &str) -> ReleaseResult<Self> {
        match s.trim() {
            "nightly" => Ok(ReleaseType::Nightly),
            "test" => Ok(ReleaseType::Test),
            other => Err(ReleaseError::InvalidTrigger(format!(
                "unknown release type '{other}' (expected nightly or test)"
            ))),
        }
    }
}

/// The external stimulus that starts a release run.
///
/// The two shapes are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// A pushed version tag, e.g. `refs/tags/v1.2.3`.
    TagPush { git_ref: String },

    /// A manually invoked dispatch.
    ManualDispatch { release_type: ReleaseType },
}

impl TriggerEvent {
    pub fn tag_push(git_ref: impl Into<String>) -> Self {
        TriggerEvent::TagPush {
            git_ref: git_ref.into(),
        }
    }

    pub fn manual(release_type: ReleaseType) -> Self {
        TriggerEvent::ManualDispatch { release_type }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TriggerEvent::TagPush { .. } => "tag_push",
            TriggerEvent::ManualDispatch { .. } => "manual_dispatch",
        }
    }

    /// Classify a CI runner's event description.
    ///
    /// `event_name` decides the shape: `push` requires a `refs/tags/` ref,
    /// `workflow_dispatch` requires a release type. Anything else is rejected.
    pub fn from_runner_context(
        event_name: Option<&str>,
        git_ref: Option<&str>,
        release_type: Option<&str>,
    ) -> ReleaseResult<Self> {
        match event_name.map(str::trim) {
            Some("push") => match git_ref {
                Some(r) if r.starts_with("refs/tags/") => Ok(TriggerEvent::tag_push(r)),
                Some(r) => Err(ReleaseError::InvalidTrigger(format!(
                    "push event for '{r}' is not a tag push"
                ))),
                None => Err(ReleaseError::InvalidTrigger(
                    "push event without a ref".to_string(),
                )),
            },
            Some("workflow_dispatch") => match release_type {
                Some(t) => Ok(TriggerEvent::manual(t.parse()?)),
                None => Err(ReleaseError::InvalidTrigger(
                    "dispatch event without release_type".to_string(),
                )),
            },
            Some(other) => Err(ReleaseError::InvalidTrigger(format!(
                "unsupported event '{other}'"
            ))),
            None => Err(ReleaseError::InvalidTrigger(
                "no event name in runner context".to_string(),
            )),
        }
    }

    /// Classify the current process environment.
    ///
    /// Reads `GITHUB_EVENT_NAME`, `GITHUB_REF` and `RELCAST_RELEASE_TYPE`.
    pub fn from_env() -> ReleaseResult<Self> {
        let event_name = std::env::var("GITHUB_EVENT_NAME").ok();
        let git_ref = std::env::var("GITHUB_REF").ok();
        let release_type = std::env::var("RELCAST_RELEASE_TYPE").ok();
        Self::from_runner_context(
            event_name.as_deref(),
            git_ref.as_deref(),
            release_type.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_type_parses_known_values() {
        assert_eq!("nightly".parse::<ReleaseType>().unwrap(), ReleaseType::Nightly);
        assert_eq!("test".parse::<ReleaseType>().unwrap(), ReleaseType::Test);
        assert!("weekly".parse::<ReleaseType>().is_err());
    }

    #[test]
    fn push_of_tag_is_tag_push() {
        let event =
            TriggerEvent::from_runner_context(Some("push"), Some("refs/tags/v1.2.3"), None).unwrap();
        assert_eq!(event, TriggerEvent::tag_push("refs/tags/v1.2.3"));
    }

    #[test]
    fn push_of_branch_is_rejected() {
        let err = TriggerEvent::from_runner_context(Some("push"), Some("refs/heads/main"), None)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::InvalidTrigger(_)));
    }

    #[test]
    fn dispatch_uses_release_type_even_if_ref_is_set() {
        let event = TriggerEvent::from_runner_context(
            Some("workflow_dispatch"),
            Some("refs/heads/main"),
            Some("test"),
        )
        .unwrap();
        assert_eq!(event, TriggerEvent::manual(ReleaseType::Test));
    }

    #[test]
    fn dispatch_without_type_is_rejected() {
        assert!(TriggerEvent::from_runner_context(Some("workflow_dispatch"), None, None).is_err());
    }

    #[test]
    fn unknown_or_missing_event_is_rejected() {
        assert!(TriggerEvent::from_runner_context(Some("pull_request"), None, None).is_err());
        assert!(TriggerEvent::from_runner_context(None, Some("refs/tags/v1.0.0"), None).is_err());
    }

    #[test]
    fn serde_shape_is_tagged() {
        let json = serde_json::to_value(TriggerEvent::manual(ReleaseType::Nightly)).unwrap();
        assert_eq!(json["kind"], "manual_dispatch");
        assert_eq!(json["release_type"], "nightly");
    }
}
