//! Service configuration.
//!
//! Reads:
//! - `GRADEBOOK_STRICT_CRITERIA` (optional, default: "false")
//! - `GRADEBOOK_PAGE_SIZE` (optional, default: 10, clamped to 1..=100)

use crate::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Behaviour switches shared by the services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradebookConfig {
    /// Check evaluation scores against the project type's grading criteria
    pub strict_criteria: bool,
    /// Page size used when the caller does not pass one
    pub default_page_size: u32,
}

impl Default for GradebookConfig {
    fn default() -> Self {
        Self {
            strict_criteria: false,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl GradebookConfig {
    /// Set strict criteria validation
    pub fn with_strict_criteria(mut self, strict: bool) -> Self {
        self.strict_criteria = strict;
        self
    }

    /// Set the default page size (clamped to 1..=100)
    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("GRADEBOOK_STRICT_CRITERIA") {
            config.strict_criteria = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(size) = lookup("GRADEBOOK_PAGE_SIZE").and_then(|v| v.trim().parse::<u32>().ok())
        {
            config = config.with_default_page_size(size);
        }

        config
    }
}
