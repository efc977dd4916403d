//! Fenced code block extraction.
//!
//! Models answer with markdown. The text generation types expect fenced
//! blocks tagged `html`, `css` and `js`/`javascript`; tags match
//! case-insensitively and the first block per tag wins. Blank blocks count
//! as absent. Extraction only ever runs on the complete response.

use once_cell::sync::Lazy;
use regex::Regex;

use kiln_core::GenerationType;

use crate::artifact::{CodeArtifact, HtmlCode, MultiFileCode};
use crate::error::{CodegenError, CodegenResult};

static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("html"));
static CSS_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("css"));
static JS_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("javascript|js"));

fn fence_pattern(tags: &str) -> Regex {
    Regex::new(&format!(r"(?i)```(?:{})[ \t]*\r?\n([\s\S]*?)```", tags))
        .expect("fence pattern is a valid regex")
}

/// Parse a complete response for a text generation type.
pub fn parse_code(raw: &str, generation_type: GenerationType) -> CodegenResult<CodeArtifact> {
    match generation_type {
        GenerationType::SingleFile => Ok(CodeArtifact::Html(parse_html_code(raw))),
        GenerationType::MultiFile => Ok(CodeArtifact::MultiFile(parse_multi_file_code(raw))),
        GenerationType::MultiStepProject => Err(CodegenError::UnsupportedType(generation_type)),
    }
}

/// Single-file extraction. Without an `html` block the whole response is the page.
pub fn parse_html_code(raw: &str) -> HtmlCode {
    let html_code = extract_block(raw, &HTML_BLOCK).or_else(|| non_blank(raw.trim()));
    HtmlCode {
        html_code,
        description: None,
    }
}

pub fn parse_multi_file_code(raw: &str) -> MultiFileCode {
    MultiFileCode {
        html_code: extract_block(raw, &HTML_BLOCK),
        css_code: extract_block(raw, &CSS_BLOCK),
        js_code: extract_block(raw, &JS_BLOCK),
        description: None,
    }
}

/// Content of the first fenced block `block` matches, trimmed.
fn extract_block(text: &str, block: &Regex) -> Option<String> {
    block
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_blank(m.as_str().trim()))
}

fn non_blank(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_block() {
        let raw = "Here you go:\n```html\n<button>Click</button>\n```\nEnjoy!";
        let code = parse_html_code(raw);
        assert_eq!(code.html_code.as_deref(), Some("<button>Click</button>"));
    }

    #[test]
    fn test_no_fence_falls_back_to_raw() {
        let raw = "  <!DOCTYPE html><html><body>hi</body></html>\n\n";
        let code = parse_html_code(raw);
        assert_eq!(
            code.html_code.as_deref(),
            Some("<!DOCTYPE html><html><body>hi</body></html>")
        );
    }

    #[test]
    fn test_blank_response_has_no_html() {
        assert_eq!(parse_html_code("  \n ").html_code, None);
    }

    #[test]
    fn test_multi_file_blocks() {
        let raw = "```HTML\n<div id=\"app\"></div>\n```\n\n```css\nbody { margin: 0; }\n```\n\n```javascript\nconsole.log('hi');\n```";
        let code = parse_multi_file_code(raw);
        assert_eq!(code.html_code.as_deref(), Some("<div id=\"app\"></div>"));
        assert_eq!(code.css_code.as_deref(), Some("body { margin: 0; }"));
        assert_eq!(code.js_code.as_deref(), Some("console.log('hi');"));
    }

    #[test]
    fn test_first_match_wins() {
        let raw = "```js\nfirst();\n```\n```js\nsecond();\n```";
        assert_eq!(parse_multi_file_code(raw).js_code.as_deref(), Some("first();"));
    }

    #[test]
    fn test_empty_block_is_absent() {
        let raw = "```html\n<p>x</p>\n```\n```css\n   \n```";
        let code = parse_multi_file_code(raw);
        assert_eq!(code.css_code, None);
        assert_eq!(code.js_code, None);
    }

    #[test]
    fn test_json_block_is_not_js() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(parse_multi_file_code(raw).js_code, None);
    }

    #[test]
    fn test_multi_file_has_no_raw_fallback() {
        assert_eq!(parse_multi_file_code("<p>unfenced</p>").html_code, None);
    }

    #[test]
    fn test_fence_patterns_are_shared_and_case_insensitive() {
        assert!(HTML_BLOCK.is_match("```HTML\n<p>a</p>\n```"));
        assert!(CSS_BLOCK.is_match("```Css\np {}\n```"));
        assert!(JS_BLOCK.is_match("```JavaScript\nrun();\n```"));

        let raw = "```html\n<p>again</p>\n```";
        for _ in 0..3 {
            assert_eq!(parse_html_code(raw).html_code.as_deref(), Some("<p>again</p>"));
        }
    }

    #[test]
    fn test_project_type_is_unsupported() {
        let err = parse_code("x", GenerationType::MultiStepProject).unwrap_err();
        assert!(err.is_configuration());
    }
}
