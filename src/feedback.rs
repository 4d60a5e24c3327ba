//! Feedback accumulation and message rendering.
//!
//! Every narrowing step appends a [`FeedbackComponent`] describing where the
//! grader is looking ("Check the first for loop.", "Did you check the body?").
//! When a comparison fails, the accumulated components are rendered
//! oldest-first and joined with the terminal message, so the student reads a
//! path from the whole submission down to the exact spot that is wrong.

/// One message fragment in a feedback chain.
///
/// Templates use `{{name}}` placeholders filled from `kwargs`. A component
/// with `append = false` replaces everything accumulated before it.
#[derive(Debug, Clone)]
pub struct FeedbackComponent {
    pub template: String,
    pub kwargs: Vec<(String, String)>,
    pub append: bool,
}

impl FeedbackComponent {
    pub fn new(template: impl Into<String>) -> FeedbackComponent {
        FeedbackComponent {
            template: template.into(),
            kwargs: Vec::new(),
            append: true,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> FeedbackComponent {
        self.kwargs.push((key.into(), value.into()));
        self
    }

    pub fn replacing(mut self) -> FeedbackComponent {
        self.append = false;
        self
    }

    pub fn render(&self) -> String {
        render(&self.template, &self.kwargs)
    }
}

/// Fill `{{name}}` placeholders in a template.
pub fn render(template: &str, kwargs: &[(String, String)]) -> String {
    let mut out = template.to_string();
    for (key, value) in kwargs {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

/// Render an accumulated chain plus its terminal component into one message.
///
/// The last non-appending component wins: it and everything after it form
/// the message, discarding the earlier path.
pub fn assemble(chain: &[FeedbackComponent], terminal: &FeedbackComponent) -> String {
    let mut all: Vec<&FeedbackComponent> = chain.iter().collect();
    all.push(terminal);

    let start = all
        .iter()
        .rposition(|c| !c.append)
        .unwrap_or(0);

    all[start..]
        .iter()
        .map(|c| c.render())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// WORDING HELPERS
// ============================================================================

/// English ordinal for a one-based position: `1st`, `2nd`, `3rd`, `11th`.
pub fn ordinal(position: usize) -> String {
    let suffix = match (position % 10, position % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", position, suffix)
}

/// English multiplicity: `once`, `twice`, `3 times`.
pub fn times(count: usize) -> String {
    match count {
        1 => "once".to_string(),
        2 => "twice".to_string(),
        n => format!("{} times", n),
    }
}

/// Truncate a long representation for inline display.
pub fn shorten(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit.saturating_sub(5)).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(112), "112th");
    }

    #[test]
    fn multiplicities() {
        assert_eq!(times(1), "once");
        assert_eq!(times(2), "twice");
        assert_eq!(times(3), "3 times");
    }

    #[test]
    fn template_interpolation() {
        let component = FeedbackComponent::new("Check the {{ordinal}} {{typestr}}.")
            .with("ordinal", "2nd")
            .with("typestr", "for loop");
        assert_eq!(component.render(), "Check the 2nd for loop.");
    }

    #[test]
    fn replacing_component_discards_prefix() {
        let chain = vec![
            FeedbackComponent::new("Check the first for loop."),
            FeedbackComponent::new("Did you check the body?"),
        ];
        let terminal = FeedbackComponent::new("Expected `5`, but got `4`.");
        assert_eq!(
            assemble(&chain, &terminal),
            "Check the first for loop. Did you check the body? Expected `5`, but got `4`."
        );

        let replacing = FeedbackComponent::new("Just fix it.").replacing();
        assert_eq!(assemble(&chain, &replacing), "Just fix it.");
    }

    #[test]
    fn shortening() {
        assert_eq!(shorten("short", 50), "short");
        let long = "x".repeat(60);
        let shortened = shorten(&long, 50);
        assert_eq!(shortened.len(), 48);
        assert!(shortened.ends_with("..."));
    }
}
