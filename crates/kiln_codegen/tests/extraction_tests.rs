//! Extraction and persistence of complete model responses.

use std::fs;

use kiln_codegen::{parse_code, CodeFileSaver, CodegenError};
use kiln_core::GenerationType;

const BUTTON_RESPONSE: &str = "Here is your page:\n\n```html\n<!DOCTYPE html>\n<html>\n<body><button>Click</button></body>\n</html>\n```\n\nEnjoy!";

const THREE_BLOCKS: &str = "```HTML\n<link rel=\"stylesheet\" href=\"style.css\"><div id=\"app\"></div>\n```\n\
Some styles:\n```css\n#app { color: red; }\n```\n\
```javascript\ndocument.getElementById('app').textContent = 'hi';\n```\n\
```js\nconsole.log('second block is ignored');\n```";

#[test]
fn single_file_response_is_saved_under_app_dir() {
    let dir = tempfile::tempdir().unwrap();
    let saver = CodeFileSaver::new(dir.path());

    let artifact = parse_code(BUTTON_RESPONSE, GenerationType::SingleFile).unwrap();
    let out = saver.save_for_app(&artifact, 42).unwrap();

    assert_eq!(out, dir.path().join("html_42"));
    let html = fs::read_to_string(out.join("index.html")).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<button>Click</button>"));
    assert!(!html.contains("```"));
    assert!(!out.join("style.css").exists());
}

#[test]
fn multi_file_response_writes_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let saver = CodeFileSaver::new(dir.path());

    let artifact = parse_code(THREE_BLOCKS, GenerationType::MultiFile).unwrap();
    let out = saver.save_for_app(&artifact, 7).unwrap();

    assert_eq!(out, dir.path().join("multi_file_7"));
    assert_eq!(
        fs::read_to_string(out.join("style.css")).unwrap(),
        "#app { color: red; }"
    );
    let js = fs::read_to_string(out.join("script.js")).unwrap();
    assert!(js.contains("textContent"));
    assert!(!js.contains("second block"));
    assert!(fs::read_to_string(out.join("index.html")).unwrap().contains("id=\"app\""));
}

#[test]
fn regeneration_replaces_previous_files() {
    let dir = tempfile::tempdir().unwrap();
    let saver = CodeFileSaver::new(dir.path());

    let first = parse_code(THREE_BLOCKS, GenerationType::MultiFile).unwrap();
    saver.save_for_app(&first, 7).unwrap();

    let second = parse_code("```html\n<p>only html</p>\n```", GenerationType::MultiFile).unwrap();
    let out = saver.save_for_app(&second, 7).unwrap();

    assert!(out.join("index.html").exists());
    assert!(!out.join("style.css").exists());
    assert!(!out.join("script.js").exists());
}

#[test]
fn multi_file_without_html_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let saver = CodeFileSaver::new(dir.path());

    let artifact = parse_code("```css\np {}\n```", GenerationType::MultiFile).unwrap();
    let err = saver.save_for_app(&artifact, 3).unwrap_err();

    assert!(matches!(err, CodegenError::MissingField("htmlCode")));
    assert!(!dir.path().join("multi_file_3").exists());
}

#[test]
fn project_type_is_not_parsed() {
    assert!(matches!(
        parse_code("anything", GenerationType::MultiStepProject),
        Err(CodegenError::UnsupportedType(GenerationType::MultiStepProject))
    ));
}

#[test]
fn unique_saves_never_collide() {
    let dir = tempfile::tempdir().unwrap();
    let saver = CodeFileSaver::new(dir.path());
    let artifact = parse_code(BUTTON_RESPONSE, GenerationType::SingleFile).unwrap();

    let a = saver.save_unique(&artifact).unwrap();
    let b = saver.save_unique(&artifact).unwrap();

    assert_ne!(a, b);
    assert!(a.file_name().unwrap().to_string_lossy().starts_with("html_"));
}
