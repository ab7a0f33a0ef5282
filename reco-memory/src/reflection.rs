//! Reflection prompt assembly.

use crate::record::InteractionRecord;
use crate::{MemoryError, MemoryResult};

/// Placeholder replaced by the newline-joined interaction lines.
pub const INTERACTIONS_PLACEHOLDER: &str = "{{interactions}}";

/// Prompt used when no custom template is configured.
pub const DEFAULT_REFLECTION_TEMPLATE: &str = "You help a recommender system understand what a \
user enjoys. The user interacted with the following items and gave them these ratings:\n\
{{interactions}}\n\
Summarize the user's preferences based on these interactions in four sentences.\n\
User preferences: ";

/// Template turning a short-term window into a generation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionTemplate {
    template: String,
}

impl ReflectionTemplate {
    /// Creates a template from text containing [`INTERACTIONS_PLACEHOLDER`].
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidTemplate`] when the placeholder is absent.
    pub fn new(template: impl Into<String>) -> MemoryResult<Self> {
        let template = template.into();
        if !template.contains(INTERACTIONS_PLACEHOLDER) {
            return Err(MemoryError::InvalidTemplate(
                "template must contain the {{interactions}} placeholder",
            ));
        }
        Ok(Self { template })
    }

    /// Substitutes the interaction lines into the template.
    #[must_use]
    pub fn render(&self, interactions: &str) -> String {
        self.template.replace(INTERACTIONS_PLACEHOLDER, interactions)
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for ReflectionTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_REFLECTION_TEMPLATE.to_owned(),
        }
    }
}

/// Formats one window entry as `"<item_id> <description>, rating: <rating>"`.
#[must_use]
pub fn interaction_line(record: &InteractionRecord, description: &str) -> String {
    format!(
        "{} {}, rating: {}",
        record.item_id(),
        description,
        record.rating()
    )
}
