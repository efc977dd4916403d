//! Fixed topology of the generation pipeline.
//!
//! ```text
//! START -> image_collection -> prompt_enhancement -> routing -> code_generation
//!       -> quality_check -[edge]-> project_build -> END
//!                              \-> END
//!                              \-> code_generation (retry)
//! ```
//!
//! The only branching point is after `quality_check`. Which edge is taken is
//! decided by [`route_after_quality_check`], a pure function of the context.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::WorkflowContext;
use crate::types::GenerationType;

/// Quality-gate verdicts that send the run back this many times at most.
pub const MAX_QUALITY_RETRIES: u32 = 3;

/// Pipeline nodes, in their forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    ImageCollection,
    PromptEnhancement,
    Routing,
    CodeGeneration,
    QualityCheck,
    ProjectBuild,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::ImageCollection => "image_collection",
            Node::PromptEnhancement => "prompt_enhancement",
            Node::Routing => "routing",
            Node::CodeGeneration => "code_generation",
            Node::QualityCheck => "quality_check",
            Node::ProjectBuild => "project_build",
        }
    }

    pub fn all() -> [Node; 6] {
        [
            Node::ImageCollection,
            Node::PromptEnhancement,
            Node::Routing,
            Node::CodeGeneration,
            Node::QualityCheck,
            Node::ProjectBuild,
        ]
    }

    /// Entry node of every run.
    pub fn start() -> Node {
        Node::ImageCollection
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named edges leaving `quality_check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityEdge {
    /// Proceed to `project_build`.
    Build,
    /// Finish without a build.
    SkipBuild,
    /// Regenerate the code.
    Retry,
}

/// Where the executor goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Node),
    End,
}

/// Build-or-skip decision for a generation type.
pub fn route_build_or_skip(generation_type: Option<GenerationType>) -> QualityEdge {
    match generation_type {
        Some(t) if t.needs_build() => QualityEdge::Build,
        _ => QualityEdge::SkipBuild,
    }
}

/// Decide the edge after `quality_check`.
///
/// The retry counter is checked first: once it reaches `max_retries` the run
/// falls through to the build/skip decision whatever the verdict says. A
/// missing verdict counts as invalid.
pub fn route_after_quality_check(context: &WorkflowContext, max_retries: u32) -> QualityEdge {
    if context.quality_check_count >= max_retries {
        warn!(
            "Quality check retried {} times, accepting the current artifact",
            context.quality_check_count
        );
        return route_build_or_skip(context.generation_type);
    }

    match &context.quality_result {
        Some(result) if result.is_valid => {
            info!("Quality check passed");
            route_build_or_skip(context.generation_type)
        }
        _ => {
            warn!("Quality check failed, regenerating code");
            QualityEdge::Retry
        }
    }
}

/// Transition table. `quality_check` consults the edge decision; the
/// executor applies the retry counter increment when it takes `Retry`.
pub fn next_transition(node: Node, edge: Option<QualityEdge>) -> Transition {
    match node {
        Node::ImageCollection => Transition::Next(Node::PromptEnhancement),
        Node::PromptEnhancement => Transition::Next(Node::Routing),
        Node::Routing => Transition::Next(Node::CodeGeneration),
        Node::CodeGeneration => Transition::Next(Node::QualityCheck),
        Node::QualityCheck => match edge {
            Some(QualityEdge::Retry) => Transition::Next(Node::CodeGeneration),
            Some(QualityEdge::Build) => Transition::Next(Node::ProjectBuild),
            Some(QualityEdge::SkipBuild) | None => Transition::End,
        },
        Node::ProjectBuild => Transition::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QualityResult, RequestContext};

    fn context(generation_type: GenerationType, count: u32, valid: Option<bool>) -> WorkflowContext {
        let mut ctx = WorkflowContext::new(RequestContext::new(1, 1), "prompt")
            .with_generation_type(generation_type);
        ctx.quality_check_count = count;
        ctx.quality_result = valid.map(|v| {
            if v {
                QualityResult::valid()
            } else {
                QualityResult::invalid(vec!["broken".into()])
            }
        });
        ctx
    }

    #[test]
    fn test_valid_result_routes_by_type() {
        let ctx = context(GenerationType::SingleFile, 0, Some(true));
        assert_eq!(route_after_quality_check(&ctx, 3), QualityEdge::SkipBuild);

        let ctx = context(GenerationType::MultiFile, 1, Some(true));
        assert_eq!(route_after_quality_check(&ctx, 3), QualityEdge::SkipBuild);

        let ctx = context(GenerationType::MultiStepProject, 0, Some(true));
        assert_eq!(route_after_quality_check(&ctx, 3), QualityEdge::Build);
    }

    #[test]
    fn test_invalid_or_missing_result_retries() {
        let ctx = context(GenerationType::MultiFile, 2, Some(false));
        assert_eq!(route_after_quality_check(&ctx, 3), QualityEdge::Retry);

        let ctx = context(GenerationType::MultiFile, 0, None);
        assert_eq!(route_after_quality_check(&ctx, 3), QualityEdge::Retry);
    }

    #[test]
    fn test_counter_limit_forces_build_or_skip() {
        let ctx = context(GenerationType::MultiStepProject, 3, Some(false));
        assert_eq!(route_after_quality_check(&ctx, 3), QualityEdge::Build);

        let ctx = context(GenerationType::SingleFile, 3, Some(false));
        assert_eq!(route_after_quality_check(&ctx, 3), QualityEdge::SkipBuild);
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(
            next_transition(Node::Routing, None),
            Transition::Next(Node::CodeGeneration)
        );
        assert_eq!(
            next_transition(Node::QualityCheck, Some(QualityEdge::Retry)),
            Transition::Next(Node::CodeGeneration)
        );
        assert_eq!(
            next_transition(Node::QualityCheck, Some(QualityEdge::Build)),
            Transition::Next(Node::ProjectBuild)
        );
        assert_eq!(
            next_transition(Node::QualityCheck, Some(QualityEdge::SkipBuild)),
            Transition::End
        );
        assert_eq!(next_transition(Node::ProjectBuild, None), Transition::End);
    }
}
