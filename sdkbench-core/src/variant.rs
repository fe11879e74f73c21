use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The client SDK a run is driving. Both talk to the same analytics service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkVariant {
    Operational,
    Enterprise,
}

impl SdkVariant {
    pub const ALL: [SdkVariant; 2] = [SdkVariant::Operational, SdkVariant::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            SdkVariant::Operational => "operational",
            SdkVariant::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SdkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown SDK type: {0} (expected `operational` or `enterprise`)")]
pub struct UnknownVariant(pub String);

impl FromStr for SdkVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operational" => Ok(SdkVariant::Operational),
            "enterprise" => Ok(SdkVariant::Enterprise),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}
