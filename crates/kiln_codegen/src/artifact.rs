//! Structured artifacts produced by generation.

use serde::{Deserialize, Serialize};

use kiln_core::GenerationType;

/// A single self-contained HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlCode {
    #[serde(default)]
    pub html_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// HTML, CSS and JavaScript kept in separate files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFileCode {
    #[serde(default)]
    pub html_code: Option<String>,
    #[serde(default)]
    pub css_code: Option<String>,
    #[serde(default)]
    pub js_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Output of the text generation types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodeArtifact {
    Html(HtmlCode),
    MultiFile(MultiFileCode),
}

impl CodeArtifact {
    pub fn generation_type(&self) -> GenerationType {
        match self {
            CodeArtifact::Html(_) => GenerationType::SingleFile,
            CodeArtifact::MultiFile(_) => GenerationType::MultiFile,
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            CodeArtifact::Html(code) => code.html_code.as_deref(),
            CodeArtifact::MultiFile(code) => code.html_code.as_deref(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            CodeArtifact::Html(code) => code.description.as_deref(),
            CodeArtifact::MultiFile(code) => code.description.as_deref(),
        }
    }

    /// Present fields paired with the file they are written to.
    pub fn files(&self) -> Vec<(FrontendFile, &str)> {
        let fields: Vec<(FrontendFile, Option<&String>)> = match self {
            CodeArtifact::Html(code) => vec![(FrontendFile::Html, code.html_code.as_ref())],
            CodeArtifact::MultiFile(code) => vec![
                (FrontendFile::Html, code.html_code.as_ref()),
                (FrontendFile::Css, code.css_code.as_ref()),
                (FrontendFile::Js, code.js_code.as_ref()),
            ],
        };
        fields
            .into_iter()
            .filter_map(|(file, content)| {
                content
                    .map(String::as_str)
                    .filter(|c| !c.trim().is_empty())
                    .map(|c| (file, c))
            })
            .collect()
    }
}

/// Fixed file names for text artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontendFile {
    Html,
    Css,
    Js,
}

impl FrontendFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            FrontendFile::Html => "index.html",
            FrontendFile::Css => "style.css",
            FrontendFile::Js => "script.js",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_skip_absent_and_blank() {
        let artifact = CodeArtifact::MultiFile(MultiFileCode {
            html_code: Some("<p>x</p>".into()),
            css_code: Some("   \n".into()),
            js_code: None,
            description: None,
        });

        let files = artifact.files();
        assert_eq!(files, vec![(FrontendFile::Html, "<p>x</p>")]);
    }

    #[test]
    fn test_structured_json_shape() {
        let code: MultiFileCode =
            serde_json::from_str(r#"{"htmlCode":"<p></p>","jsCode":"go()"}"#).unwrap();
        assert_eq!(code.html_code.as_deref(), Some("<p></p>"));
        assert_eq!(code.css_code, None);
        assert_eq!(code.js_code.as_deref(), Some("go()"));
    }
}
