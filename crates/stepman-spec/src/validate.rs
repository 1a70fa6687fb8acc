//! Step descriptor validation.
//!
//! Hard errors reject the descriptor (and with it the whole aggregation or
//! share contribution). Warnings are advisory and never block.

use std::sync::LazyLock;

use regex::Regex;

use crate::descriptor::StepDescriptor;

/// Soft limit on summary length, in characters.
pub const MAX_SUMMARY_LENGTH: usize = 100;

static STEP_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid regex"));

/// Outcome of validating one descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Hard failures.
    pub errors: Vec<String>,
    /// Advisory warnings.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Whether the descriptor may be accepted.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Whether `id` is a well-formed step identifier (`[a-z0-9-]+`).
pub fn is_valid_step_id(id: &str) -> bool {
    STEP_ID_RE.is_match(id)
}

/// Validate a step descriptor.
pub fn validate(step: &StepDescriptor) -> ValidationReport {
    let mut report = ValidationReport::default();

    if step.id.is_empty() {
        report.errors.push("step id is required".to_string());
    } else if !is_valid_step_id(&step.id) {
        report
            .errors
            .push(format!("step id '{}' doesn't conform to [a-z0-9-]", step.id));
    }

    if step.version.trim().is_empty() {
        report.errors.push("version tag is required".to_string());
    }

    match &step.source {
        None => report.errors.push("source is required".to_string()),
        Some(source) => {
            if source.git.is_empty() {
                report.errors.push("source.git is required".to_string());
            }
            if source.commit.is_empty() {
                report.errors.push("source.commit is required".to_string());
            }
        }
    }

    for (idx, input) in step.inputs.iter().enumerate() {
        let Some((key, value)) = input.key_value() else {
            report.errors.push(format!(
                "input #{idx}: invalid key-value pair ({} keys besides opts)",
                input.key_count()
            ));
            continue;
        };
        if !input.opts.value_options.is_empty() && value.is_empty() {
            report
                .errors
                .push(format!("input '{key}' has value_options but no default value"));
        }
    }

    if let Some(summary) = &step.summary {
        if summary.contains('\n') {
            report.warnings.push("summary should be one line".to_string());
        }
        let len = summary.chars().count();
        if len > MAX_SUMMARY_LENGTH {
            report.warnings.push(format!(
                "summary should be at most {MAX_SUMMARY_LENGTH} characters, actual: {len}"
            ));
        }
    }

    report
}
