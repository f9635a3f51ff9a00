//! Output format selection for the final video.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested delivery format, mapped to the generation service's
/// aspect-ratio strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// 16:9 widescreen
    #[default]
    Youtube,
    /// 4:3 classic
    Horizontal,
    /// 9:16 portrait
    Vertical,
}

impl OutputFormat {
    /// Aspect-ratio string understood by the generation service.
    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            OutputFormat::Youtube => "16:9",
            OutputFormat::Horizontal => "4:3",
            OutputFormat::Vertical => "9:16",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Youtube => "youtube",
            OutputFormat::Horizontal => "horizontal",
            OutputFormat::Vertical => "vertical",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
