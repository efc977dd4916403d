//! Collaborators the pipeline stations delegate to.
//!
//! The stations own the control flow; everything that talks to a model, the
//! filesystem or a subprocess sits behind one of these traits and is wired in
//! by the application.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{GenerationType, ImageResource, QualityResult, RequestContext};

/// Gathers images that can enrich the generated page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageCollector: Send + Sync {
    async fn collect(&self, ctx: &RequestContext, prompt: &str) -> CoreResult<Vec<ImageResource>>;
}

/// Rewrites the prompt using collected context.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    async fn enhance(&self, prompt: &str, images: &[ImageResource]) -> CoreResult<String>;
}

/// Picks a generation type for a prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationRouter: Send + Sync {
    async fn route(&self, ctx: &RequestContext, prompt: &str) -> CoreResult<GenerationType>;
}

/// Produces code for a prompt and returns the directory it was written to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(
        &self,
        ctx: &RequestContext,
        generation_type: GenerationType,
        prompt: &str,
    ) -> CoreResult<PathBuf>;
}

/// Judges a generated directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QualityValidator: Send + Sync {
    async fn validate(&self, generation_type: GenerationType, code_dir: &Path) -> CoreResult<QualityResult>;
}

/// Builds a generated project. Outcome is reported through the builder's own
/// status channel; the return value only tells whether `dist` is usable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectBuilder: Send + Sync {
    async fn build(&self, ctx: &RequestContext, project_dir: &Path) -> bool;
}

/// Collector used when no image source is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImageCollector;

#[async_trait]
impl ImageCollector for NoImageCollector {
    async fn collect(&self, _ctx: &RequestContext, _prompt: &str) -> CoreResult<Vec<ImageResource>> {
        Ok(Vec::new())
    }
}

/// Appends the collected images as a markdown section the model can use.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageListEnhancer;

#[async_trait]
impl PromptEnhancer for ImageListEnhancer {
    async fn enhance(&self, prompt: &str, images: &[ImageResource]) -> CoreResult<String> {
        if images.is_empty() {
            return Ok(prompt.to_string());
        }

        let mut out = String::from(prompt);
        out.push_str("\n\n## Available image resources\n");
        out.push_str("Use the images below where they fit the page:\n");
        for image in images {
            out.push_str(&format!(
                "- {:?}: {} ({})\n",
                image.category, image.description, image.url
            ));
        }
        Ok(out)
    }
}

/// Keyword heuristic for runs that arrive without a generation type.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordRouter;

impl KeywordRouter {
    const PROJECT_HINTS: [&'static str; 6] = ["vue", "project", "multi-page", "router", "dashboard", "admin"];
    const MULTI_FILE_HINTS: [&'static str; 4] = ["css file", "javascript file", "separate files", "multi-file"];

    pub fn classify(prompt: &str) -> GenerationType {
        let lower = prompt.to_lowercase();
        if Self::PROJECT_HINTS.iter().any(|h| lower.contains(h)) {
            GenerationType::MultiStepProject
        } else if Self::MULTI_FILE_HINTS.iter().any(|h| lower.contains(h)) {
            GenerationType::MultiFile
        } else {
            GenerationType::SingleFile
        }
    }
}

#[async_trait]
impl GenerationRouter for KeywordRouter {
    async fn route(&self, _ctx: &RequestContext, prompt: &str) -> CoreResult<GenerationType> {
        Ok(Self::classify(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageCategory;

    #[tokio::test]
    async fn test_image_list_enhancer() {
        let images = vec![ImageResource {
            category: ImageCategory::Logo,
            description: "bakery logo".into(),
            url: "https://img.example/logo.png".into(),
        }];

        let out = ImageListEnhancer.enhance("bakery site", &images).await.unwrap();
        assert!(out.starts_with("bakery site\n\n## Available image resources"));
        assert!(out.contains("Logo: bakery logo (https://img.example/logo.png)"));

        let unchanged = ImageListEnhancer.enhance("bakery site", &[]).await.unwrap();
        assert_eq!(unchanged, "bakery site");
    }

    #[test]
    fn test_keyword_router() {
        assert_eq!(
            KeywordRouter::classify("An admin dashboard in Vue"),
            GenerationType::MultiStepProject
        );
        assert_eq!(
            KeywordRouter::classify("a form with separate files for styles"),
            GenerationType::MultiFile
        );
        assert_eq!(KeywordRouter::classify("a page with a button"), GenerationType::SingleFile);
    }
}
