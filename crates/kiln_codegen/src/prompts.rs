//! System prompts per generation type.

use kiln_core::GenerationType;

const SINGLE_FILE_PROMPT: &str = "You are a senior front-end engineer. Build exactly what the user \
asks for as one complete, self-contained HTML page. Put all CSS in a <style> element and all \
JavaScript in a <script> element inside the page. Do not reference external files except public \
CDN assets and image URLs provided by the user. Return the page in a single fenced code block \
tagged html, followed by at most a short explanation.";

const MULTI_FILE_PROMPT: &str = "You are a senior front-end engineer. Build exactly what the user \
asks for as three files: index.html, style.css and script.js. index.html must link style.css and \
script.js by those exact names. Return three fenced code blocks tagged html, css and js, in that \
order, followed by at most a short explanation.";

const PROJECT_PROMPT: &str = "You are a senior front-end engineer building a Vue 3 project with \
Vite. Create every file with the writeFile tool using paths relative to the project root: \
package.json with dev, build and preview scripts, vite.config.js, index.html, src/main.js, \
src/App.vue and any components, router and styles the request needs. Use readDir and readFile to \
inspect existing files before changing them and deleteFile for files that are no longer used. \
Only use dependencies that exist on npm. The project must build with `npm install` followed by \
`npm run build`. When finished, reply with a short summary of what you built.";

const STRUCTURED_SUFFIX: &str = "\n\nRespond with a JSON object only. Use the keys htmlCode, \
cssCode and jsCode for the file contents (omit keys that do not apply) and description for a \
one-sentence summary.";

/// System prompt for streaming or tool-driven generation.
pub fn system_prompt(generation_type: GenerationType) -> &'static str {
    match generation_type {
        GenerationType::SingleFile => SINGLE_FILE_PROMPT,
        GenerationType::MultiFile => MULTI_FILE_PROMPT,
        GenerationType::MultiStepProject => PROJECT_PROMPT,
    }
}

/// System prompt for the structured (JSON) call.
pub fn structured_system_prompt(generation_type: GenerationType) -> String {
    format!("{}{}", system_prompt(generation_type), STRUCTURED_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_mention_their_contract() {
        assert!(system_prompt(GenerationType::SingleFile).contains("tagged html"));
        assert!(system_prompt(GenerationType::MultiFile).contains("style.css"));
        assert!(system_prompt(GenerationType::MultiStepProject).contains("writeFile"));
        assert!(structured_system_prompt(GenerationType::MultiFile).contains("cssCode"));
    }
}
