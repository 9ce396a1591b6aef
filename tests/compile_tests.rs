// tests/compile_tests.rs
//
// Compilation seen from the outside: what a registered spec turns into.

mod common;

use common::FakeApp;
use hmr_spec::command::{expect_many, spec, spec_map, ExpectValue, SpecSource};
use hmr_spec::compile::{normalize_html, ExpectEntry, Step};
use hmr_spec::errors::{ErrorKind, SpecError};
use hmr_spec::runtime::{sub, Invocation, Yielder};
use hmr_spec::syntax::Label;

const TWO_FILES: &str = "\
---- App.svelte ----
<script>import Child from './Child.svelte'</script>
<Child />
::1 <p>added</p>
---- Child.svelte ----
::0 <h2>I am expected</h2>
::1 <h2>I am changed</h2>
****
::0 <h2>I am expected</h2>
::1::
  <h2>I am changed</h2>
  <p>added</p>
::
";

#[test]
fn spec_text_registers_files_and_entries() {
    let app = FakeApp::new();
    let mut launcher = app.launcher();
    let procedure = |y: &mut Yielder<'_>| -> Result<(), SpecError> {
        y.send(spec(TWO_FILES, vec![]))?;
        let snapshot = y.snapshot()?;

        let child = &snapshot.specs["Child.svelte"];
        assert_eq!(child[&Label::universal()], "");
        assert_eq!(child[&Label::from(1)], "<h2>I am changed</h2>\n");

        let labels: Vec<_> = snapshot.expects.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["0", "1"]);
        let second = &snapshot.expects[1].1;
        assert_eq!(second.steps[0].html.as_deref(), Some("<h2>I am changed</h2><p>added</p>"));

        // registration only; nothing to run
        y.send(hmr_spec::command::discard_expects())?;
        Ok(())
    };
    Invocation::new(&app.config, &mut launcher).run(&procedure).unwrap();
    assert_eq!(app.launches.get(), 0);
}

#[test]
fn object_specs_compile_verbatim() {
    let app = FakeApp::new();
    let mut launcher = app.launcher();
    let procedure = |y: &mut Yielder<'_>| -> Result<(), SpecError> {
        y.send(spec_map([
            ("plain.js", SpecSource::from("same everywhere")),
            (
                "labeled.js",
                SpecSource::Labeled(vec![(Label::from(2), "two".to_string())]),
            ),
        ]))?;
        let snapshot = y.snapshot()?;
        assert_eq!(snapshot.specs["plain.js"].len(), 1);
        assert_eq!(snapshot.specs["plain.js"][&Label::universal()], "same everywhere");
        assert!(!snapshot.specs["labeled.js"].contains_key(&Label::universal()));
        Ok(())
    };
    Invocation::new(&app.config, &mut launcher).run(&procedure).unwrap();
}

#[test]
fn html_expectations_are_normalized_at_registration() {
    let app = FakeApp::new();
    let mut launcher = app.launcher();
    let procedure = |y: &mut Yielder<'_>| -> Result<(), SpecError> {
        y.send(expect_many(vec![
            (Label::from(0), ExpectValue::from("\n  <p>\n   spaced  </p>\n<!-- note -->")),
            (Label::from(0), ExpectValue::from(sub(|_| Ok(())))),
        ]))?;
        let snapshot = y.snapshot()?;
        let entry = &snapshot.expects[0].1;
        let kinds: Vec<_> = entry.steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, ["html", "sub"]);
        assert_eq!(entry.steps[0].html.as_deref(), Some("<p> spaced </p>"));
        y.send(hmr_spec::command::discard_expects())?;
        Ok(())
    };
    Invocation::new(&app.config, &mut launcher).run(&procedure).unwrap();
}

#[test]
fn unknown_sub_slot_ends_the_invocation() {
    let app = FakeApp::new();
    let mut launcher = app.launcher();
    let procedure = |y: &mut Yielder<'_>| -> Result<(), SpecError> {
        let _ = y.send(spec("---- f ----\nx\n****\n::0::\n${3}\n::\n", vec![]));
        Ok(())
    };
    let err = Invocation::new(&app.config, &mut launcher)
        .run(&procedure)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownSub { slot: 3, available: 0 });
}

#[test]
fn merging_entries_keeps_step_order() {
    let mut entry = ExpectEntry {
        steps: vec![Step::Html("<p>a</p>".into())],
        ..ExpectEntry::default()
    };
    let hook = sub(|_| Ok(()));
    entry
        .merge(ExpectEntry {
            steps: vec![Step::Html("<p>b</p>".into())],
            before: Some(hook.clone()),
            description: Some("second".into()),
            ..ExpectEntry::default()
        })
        .unwrap();
    assert_eq!(entry.steps.len(), 2);
    assert_eq!(entry.description.as_deref(), Some("second"));
    assert!(entry.before.as_ref().unwrap().same(&hook));

    let again = ExpectEntry {
        before: Some(sub(|_| Ok(()))),
        ..ExpectEntry::default()
    };
    assert_eq!(entry.merge(again), Err("before"));
}

#[test]
fn normalization_ignores_layout_only() {
    assert_eq!(
        normalize_html("<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>"),
        normalize_html("<ul><li>a</li><li>b</li></ul>")
    );
    assert_ne!(normalize_html("<p>a b</p>"), normalize_html("<p>ab</p>"));
}
