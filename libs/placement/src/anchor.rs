//! Structured deployment-unit identifier.
//!
//! A deployment unit (deployment intent group) is addressed by four path
//! segments. The orchestrator uses two encodings of that tuple:
//!
//! - the status anchor: `projects/{p}/composite-apps/{ca}/{v}/deployment-intent-groups/{dig}/status`
//! - the REST path: `/v2/projects/{p}/composite-apps/{ca}/{v}/deployment-intent-groups/{dig}`
//!
//! Both are derived from [`DigAnchor`], which validates its segments once at
//! construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnchorError;

/// Identifies one deployment intent group of a composite application version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DigAnchor {
    project: String,
    composite_app: String,
    composite_app_version: String,
    deployment_intent_group: String,
}

impl DigAnchor {
    /// Build an anchor from its segments.
    pub fn new(
        project: impl Into<String>,
        composite_app: impl Into<String>,
        composite_app_version: impl Into<String>,
        deployment_intent_group: impl Into<String>,
    ) -> Result<Self, AnchorError> {
        Ok(Self {
            project: segment("project", project.into())?,
            composite_app: segment("composite app", composite_app.into())?,
            composite_app_version: segment("composite app version", composite_app_version.into())?,
            deployment_intent_group: segment(
                "deployment intent group",
                deployment_intent_group.into(),
            )?,
        })
    }

    /// Parse the status anchor form.
    pub fn parse(anchor: &str) -> Result<Self, AnchorError> {
        let malformed = |reason: &str| AnchorError::Malformed {
            anchor: anchor.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = anchor.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            ["projects", project, "composite-apps", app, version, "deployment-intent-groups", dig, "status"] => {
                Self::new(*project, *app, *version, *dig)
            }
            [first, ..] if *first != "projects" => Err(malformed("must start with 'projects'")),
            _ => Err(malformed(
                "expected projects/{p}/composite-apps/{ca}/{v}/deployment-intent-groups/{dig}/status",
            )),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn composite_app(&self) -> &str {
        &self.composite_app
    }

    pub fn composite_app_version(&self) -> &str {
        &self.composite_app_version
    }

    pub fn deployment_intent_group(&self) -> &str {
        &self.deployment_intent_group
    }

    /// REST path of the deployment unit, relative to the orchestrator endpoint.
    pub fn rest_path(&self) -> String {
        format!(
            "/v2/projects/{}/composite-apps/{}/{}/deployment-intent-groups/{}",
            self.project, self.composite_app, self.composite_app_version, self.deployment_intent_group
        )
    }
}

fn segment(field: &'static str, value: String) -> Result<String, AnchorError> {
    if value.is_empty() {
        return Err(AnchorError::Empty { field });
    }
    if value.contains(['/', '?', '#']) {
        return Err(AnchorError::InvalidSegment { field, value });
    }
    Ok(value)
}

impl fmt::Display for DigAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/composite-apps/{}/{}/deployment-intent-groups/{}/status",
            self.project, self.composite_app, self.composite_app_version, self.deployment_intent_group
        )
    }
}

impl FromStr for DigAnchor {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DigAnchor {
    type Error = AnchorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DigAnchor> for String {
    fn from(anchor: DigAnchor) -> Self {
        anchor.to_string()
    }
}
