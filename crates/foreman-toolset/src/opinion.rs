//! Pattern-based tool opinions.
//!
//! Lets a toolset express an argument-aware verdict over one string field
//! of the invocation arguments, e.g. pre-approving read-only shell commands
//! while blocking destructive ones. Blocked patterns win over pre-approved
//! ones.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;

use crate::toolset::ToolOpinion;

/// Glob-based opinion rules over one argument field.
#[derive(Debug, Clone)]
pub struct OpinionRules {
    /// The argument field the patterns match against.
    field: String,
    /// Patterns whose match pre-approves the invocation.
    pre_approved: GlobSet,
    /// Patterns whose match blocks the invocation outright.
    blocked: GlobSet,
}

impl OpinionRules {
    /// Start building rules over `field`.
    #[must_use]
    pub fn over(field: impl Into<String>) -> OpinionRulesBuilder {
        OpinionRulesBuilder {
            field: field.into(),
            pre_approved: GlobSetBuilder::new(),
            blocked: GlobSetBuilder::new(),
        }
    }

    /// Evaluate the rules against invocation arguments.
    ///
    /// A missing or non-string field yields no opinion; the gateway falls
    /// through to static configuration.
    #[must_use]
    pub fn evaluate(&self, args: &Value) -> ToolOpinion {
        let Some(value) = args.get(&self.field).and_then(Value::as_str) else {
            return ToolOpinion::NoOpinion;
        };

        if self.blocked.is_match(value) {
            return ToolOpinion::Blocked {
                reason: format!("'{value}' matches a blocked pattern"),
            };
        }
        if self.pre_approved.is_match(value) {
            return ToolOpinion::PreApproved;
        }
        ToolOpinion::NoOpinion
    }
}

/// Builder for [`OpinionRules`].
pub struct OpinionRulesBuilder {
    field: String,
    pre_approved: GlobSetBuilder,
    blocked: GlobSetBuilder,
}

impl OpinionRulesBuilder {
    /// Add a pre-approval pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the glob does not parse.
    pub fn pre_approve(mut self, pattern: &str) -> Result<Self, globset::Error> {
        self.pre_approved.add(Glob::new(pattern)?);
        Ok(self)
    }

    /// Add a blocking pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the glob does not parse.
    pub fn block(mut self, pattern: &str) -> Result<Self, globset::Error> {
        self.blocked.add(Glob::new(pattern)?);
        Ok(self)
    }

    /// Compile the rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the accumulated globs cannot be compiled.
    pub fn build(self) -> Result<OpinionRules, globset::Error> {
        Ok(OpinionRules {
            field: self.field,
            pre_approved: self.pre_approved.build()?,
            blocked: self.blocked.build()?,
        })
    }
}
