// tests/parser_tests.rs
//
// Whole documents through the parser and both compilers.

use hmr_spec::compile::{compile_document, compile_file_content, Step};
use hmr_spec::discovery::placeholder_subs;
use hmr_spec::errors::{ReportContext, SourceContext};
use hmr_spec::syntax::parser::{parse, parse_test};
use hmr_spec::syntax::{Document, Label};
use serde_json::json;

const COUNTER: &str = "\
# counter
---- App.svelte ----
<h1>always</h1>
::0 <p>only in update 0</p>
::1::
  <p>only in update 1</p>
::
---- main.js ----
import App from './App.svelte'
****
<h1>always</h1>
::0:: initial render
  <p>only in update 0</p>
  ${0}
  <p>only in update 0</p>
::
::1 ${1}
::1 <p>only in update 1</p>
";

fn parse_counter() -> Document {
    parse_test(COUNTER, &SourceContext::from_file("counter.hmr", COUNTER)).unwrap()
}

#[test]
fn document_has_title_files_and_expectations() {
    let doc = parse_counter();
    assert_eq!(doc.title.as_deref(), Some("counter"));
    let paths: Vec<_> = doc.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["App.svelte", "main.js"]);
    let expectations = doc.expectations.as_ref().unwrap();
    assert_eq!(expectations.conditions, vec![Label::from(0), Label::from(1)]);
}

#[test]
fn file_content_has_one_text_per_label() {
    let doc = parse_counter();
    let app = compile_file_content(&doc.files[0].content);
    assert_eq!(app[&Label::universal()], "<h1>always</h1>\n");
    assert_eq!(app[&Label::from(0)], "<h1>always</h1>\n<p>only in update 0</p>\n");
    assert_eq!(app[&Label::from(1)], "<h1>always</h1>\n  <p>only in update 1</p>\n");

    let main = compile_file_content(&doc.files[1].content);
    assert_eq!(main.len(), 1);
    assert_eq!(main[&Label::universal()], "import App from './App.svelte'\n");
}

#[test]
fn document_compiles_to_steps_and_hooks() {
    let doc = parse_counter();
    let subs = placeholder_subs(&doc);
    assert_eq!(subs.len(), 2);
    let ctx = ReportContext::new(SourceContext::from_file("counter.hmr", COUNTER), "compile");
    let compiled = compile_document(&doc, &subs, &ctx).unwrap();

    let (label, first) = &compiled.expects[0];
    assert_eq!(label, &Label::from(0));
    assert_eq!(first.description.as_deref(), Some("initial render"));
    let kinds: Vec<_> = first.steps.iter().map(Step::kind).collect();
    assert_eq!(kinds, ["html", "sub", "html"]);

    let (_, second) = &compiled.expects[1];
    assert!(second.before.is_some());
    assert!(second.after.is_none());
    assert_eq!(second.steps.len(), 1);
}

#[test]
fn compiled_view_serializes_without_procedures() {
    let doc = parse_counter();
    let subs = placeholder_subs(&doc);
    let ctx = ReportContext::unsourced("compile");
    let view = compile_document(&doc, &subs, &ctx).unwrap().view();
    let value = serde_json::to_value(&view).unwrap();

    assert_eq!(value["title"], json!("counter"));
    assert_eq!(
        value["expects"][1][1],
        json!({
            "before": true,
            "after": false,
            "steps": [{ "kind": "html", "html": "<h1>always</h1><p>only in update 1</p>" }]
        })
    );
    assert_eq!(value["expects"][0][1]["steps"][1], json!({ "kind": "sub" }));
}

#[test]
fn labels_order_numerically_before_names() {
    let text = "---- f ----\n::10 ten\n::9 nine\n::b bee\n::a ay\n";
    let doc = parse(text, &SourceContext::from_file("f", text)).unwrap();
    let mut labels = doc.files[0].content.conditions.clone();
    labels.sort();
    let names: Vec<_> = labels.iter().map(Label::as_str).collect();
    assert_eq!(names, ["9", "10", "a", "b"]);
}

#[test]
fn parse_errors_point_into_the_source() {
    let text = "# broken\n---- f ----\n::0:oops\n";
    let err = parse(text, &SourceContext::from_file("broken.hmr", text)).unwrap_err();
    let report = format!("{:?}", miette::Report::new(err));
    assert!(report.contains("broken.hmr"), "{}", report);
    assert!(report.contains("hmr_spec::parse::malformed_delimiter"), "{}", report);
}
