//! Integration tests for macro resolution against on-disk workflows

use flowlineage_core::{ToolCategory, UnresolvedReason};
use flowlineage_macro::{
    MacroRequest, MacroResolver, NonInteractivePolicy, PolicyDecision, ResolutionContext,
    ResolutionPolicy, ResolveOutcome, ResolverOptions,
};
use flowlineage_workflow::XmlWorkflowLoader;
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const INPUT: &str = "AlteryxBasePluginsGui.DbFileInput.DbFileInput";
const OUTPUT: &str = "AlteryxBasePluginsGui.DbFileOutput.DbFileOutput";
const FORMULA: &str = "AlteryxBasePluginsGui.Formula.Formula";
const FILTER: &str = "AlteryxBasePluginsGui.Filter.Filter";
const SELECT: &str = "AlteryxBasePluginsGui.AlteryxSelect.AlteryxSelect";
const MACRO_INPUT: &str = "AlteryxBasePluginsGui.MacroInput.MacroInput";
const MACRO_OUTPUT: &str = "AlteryxBasePluginsGui.MacroOutput.MacroOutput";

fn tool(id: &str, plugin: &str) -> String {
    format!(
        r#"<Node ToolID="{id}"><GuiSettings Plugin="{plugin}" /><Properties><Configuration /></Properties></Node>"#
    )
}

fn macro_call(id: &str, path: &str) -> String {
    format!(
        r#"<Node ToolID="{id}"><GuiSettings /><Properties><Configuration /></Properties><EngineSettings Macro="{path}" /></Node>"#
    )
}

fn document(nodes: &[String], connections: &[(&str, &str, &str, &str)]) -> String {
    let connections: String = connections
        .iter()
        .map(|(from, from_port, to, to_port)| {
            format!(
                r#"<Connection><Origin ToolID="{from}" Connection="{from_port}" /><Destination ToolID="{to}" Connection="{to_port}" /></Connection>"#
            )
        })
        .collect();

    format!(
        "<AlteryxDocument yxmdVer=\"2022.1\"><Nodes>{}</Nodes><Connections>{}</Connections></AlteryxDocument>",
        nodes.concat(),
        connections
    )
}

/// `In -> inner(2) -> Out`
fn chain_macro(inner: String) -> String {
    document(
        &[tool("1", MACRO_INPUT), inner, tool("3", MACRO_OUTPUT)],
        &[("1", "Output", "2", "Input"), ("2", "Output", "3", "Input")],
    )
}

/// `Input(1) -> macro calls (10, 11, ...) -> Output(99)`
fn workflow_calling(macro_paths: &[&str]) -> String {
    let ids: Vec<String> = (0..macro_paths.len()).map(|i| (10 + i).to_string()).collect();

    let mut nodes = vec![tool("1", INPUT)];
    for (id, path) in ids.iter().zip(macro_paths) {
        nodes.push(macro_call(id, path));
    }
    nodes.push(tool("99", OUTPUT));

    let mut chain = vec!["1".to_string()];
    chain.extend(ids);
    chain.push("99".to_string());
    let connections: Vec<(&str, &str, &str, &str)> = chain
        .windows(2)
        .map(|pair| (pair[0].as_str(), "Output", pair[1].as_str(), "Input"))
        .collect();

    document(&nodes, &connections)
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn resolver() -> MacroResolver<XmlWorkflowLoader> {
    MacroResolver::new(XmlWorkflowLoader::new(), ResolverOptions::default())
}

fn resolve(path: &Path, context: &mut ResolutionContext, policy: &mut dyn ResolutionPolicy) -> ResolveOutcome {
    resolver().resolve_file(path, context, policy).unwrap()
}

fn edges(outcome: &ResolveOutcome) -> Vec<String> {
    outcome
        .document
        .connections
        .iter()
        .map(|c| format!("{}->{}", c.from.node, c.to.node))
        .collect()
}

/// Policy fake answering from a script and recording every question
#[derive(Default)]
struct ScriptedPolicy {
    answers: VecDeque<PolicyDecision>,
    asked: Vec<String>,
}

impl ScriptedPolicy {
    fn answering(answers: Vec<PolicyDecision>) -> Self {
        Self {
            answers: answers.into(),
            asked: Vec::new(),
        }
    }
}

impl ResolutionPolicy for ScriptedPolicy {
    fn decide(&mut self, request: &MacroRequest<'_>) -> PolicyDecision {
        self.asked.push(request.reference.name.clone());
        self.answers.pop_front().unwrap_or(PolicyDecision::SkipOne)
    }
}

#[test]
fn test_splicing_replaces_reference_with_macro_internals() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Clean.yxmc"]));
    write(
        &flows.join("macros/Clean.yxmc"),
        &document(
            &[
                tool("1", MACRO_INPUT),
                tool("2", FORMULA),
                tool("3", FILTER),
                tool("4", MACRO_OUTPUT),
            ],
            &[
                ("1", "Output", "2", "Input"),
                ("2", "Output", "3", "Input"),
                ("3", "True", "4", "Input"),
            ],
        ),
    );

    let mut context = ResolutionContext::new(Vec::new());
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert!(outcome.is_complete());
    let ids: Vec<&str> = outcome.document.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "10/2", "10/3", "99"]);
    assert_eq!(edges(&outcome), vec!["10/2->10/3", "1->10/2", "10/3->99"]);

    // No residual reference or boundary nodes
    assert!(outcome.document.nodes.iter().all(|n| !matches!(
        n.category,
        ToolCategory::Macro | ToolCategory::MacroInput | ToolCategory::MacroOutput
    )));
    assert_eq!(outcome.document.node("10/3").unwrap().origin, "Clean#3");
    assert!(outcome.document.validate_connections().is_empty());
}

#[test]
fn test_declared_path_wins_over_macros_directory() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&[r"lib\Clean.yxmc"]));
    write(&flows.join("lib/Clean.yxmc"), &chain_macro(tool("2", SELECT)));
    write(&flows.join("macros/Clean.yxmc"), &chain_macro(tool("2", FILTER)));

    let mut context = ResolutionContext::new(Vec::new());
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert!(outcome.is_complete());
    assert_eq!(outcome.document.node("10/2").unwrap().category, ToolCategory::Select);
    assert!(outcome.expanded[0].path.ends_with("lib/Clean.yxmc"));
}

#[test]
fn test_same_reference_is_never_asked_twice() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("a.yxmd"), &workflow_calling(&["Ghost.yxmc", "Ghost.yxmc"]));
    write(&flows.join("b.yxmd"), &workflow_calling(&["Ghost.yxmc"]));

    let mut context = ResolutionContext::new(Vec::new());
    let mut policy = ScriptedPolicy::answering(vec![PolicyDecision::SkipOne]);

    let first = resolve(&flows.join("a.yxmd"), &mut context, &mut policy);
    let second = resolve(&flows.join("b.yxmd"), &mut context, &mut policy);

    assert_eq!(policy.asked, vec!["Ghost"]);
    assert_eq!(context.prompts_issued(), 1);
    assert_eq!(first.issues.len(), 2);
    assert_eq!(second.issues.len(), 1);
    assert!(first
        .issues
        .iter()
        .chain(&second.issues)
        .all(|issue| issue.reason == UnresolvedReason::Skipped));
}

#[test]
fn test_cyclic_macro_is_fatal_but_siblings_resolve() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["A.yxmc", "Sibling.yxmc"]));
    write(&flows.join("macros/A.yxmc"), &chain_macro(macro_call("2", "B.yxmc")));
    write(&flows.join("macros/B.yxmc"), &chain_macro(macro_call("2", "A.yxmc")));
    write(&flows.join("macros/Sibling.yxmc"), &chain_macro(tool("2", FORMULA)));

    let mut context = ResolutionContext::new(Vec::new());
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert!(outcome.is_fatal());
    let cyclic: Vec<_> = outcome.issues.iter().filter(|i| i.is_fatal()).collect();
    assert_eq!(cyclic.len(), 1);
    assert_eq!(
        cyclic[0].reason,
        UnresolvedReason::Cyclic {
            chain: vec!["A".to_string(), "B".to_string(), "A".to_string()]
        }
    );

    let expanded: Vec<&str> = outcome.expanded.iter().map(|e| e.reference.name.as_str()).collect();
    assert!(expanded.contains(&"Sibling"));
    assert_eq!(outcome.document.node("11/2").unwrap().category, ToolCategory::Formula);
}

#[test]
fn test_direct_self_reference_is_cyclic() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Loop.yxmc"]));
    write(&flows.join("macros/Loop.yxmc"), &chain_macro(macro_call("2", "Loop.yxmc")));

    let mut context = ResolutionContext::new(Vec::new());
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert!(outcome.is_fatal());
    assert_eq!(
        outcome.issues[0].reason,
        UnresolvedReason::Cyclic {
            chain: vec!["Loop".to_string(), "Loop".to_string()]
        }
    );
}

#[test]
fn test_skip_all_cancels_remaining_prompts_across_documents() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("a.yxmd"), &workflow_calling(&["Ghost1.yxmc", "Ghost2.yxmc"]));
    write(&flows.join("b.yxmd"), &workflow_calling(&["Ghost3.yxmc"]));

    let mut context = ResolutionContext::new(Vec::new());
    let mut policy = ScriptedPolicy::answering(vec![PolicyDecision::SkipAll]);

    let first = resolve(&flows.join("a.yxmd"), &mut context, &mut policy);
    let second = resolve(&flows.join("b.yxmd"), &mut context, &mut policy);

    assert_eq!(policy.asked, vec!["Ghost1"]);
    assert!(context.skip_all());

    let reasons: Vec<&UnresolvedReason> = first
        .issues
        .iter()
        .chain(&second.issues)
        .map(|i| &i.reason)
        .collect();
    assert_eq!(
        reasons,
        vec![
            &UnresolvedReason::Skipped,
            &UnresolvedReason::Missing,
            &UnresolvedReason::Missing,
        ]
    );
}

#[test]
fn test_non_interactive_batch_reports_every_missing_macro() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("a.yxmd"), &workflow_calling(&["One.yxmc", "Two.yxmc"]));
    write(&flows.join("b.yxmd"), &workflow_calling(&["Three.yxmc"]));

    let mut context = ResolutionContext::new(Vec::new());
    let mut issues = Vec::new();
    for name in ["a.yxmd", "b.yxmd"] {
        let outcome = resolve(&flows.join(name), &mut context, &mut NonInteractivePolicy);
        issues.extend(outcome.issues);
    }

    assert_eq!(issues.len(), 3);
    assert!(issues.iter().all(|i| i.reason == UnresolvedReason::Missing));
    assert_eq!(context.prompts_issued(), 0);
}

#[test]
fn test_operator_directory_is_kept_for_later_lookups() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    let shared = dir.path().join("shared");
    write(&flows.join("a.yxmd"), &workflow_calling(&["Dedupe.yxmc"]));
    write(&flows.join("b.yxmd"), &workflow_calling(&["Tidy.yxmc"]));
    write(&shared.join("team/Dedupe.yxmc"), &chain_macro(tool("2", FORMULA)));
    write(&shared.join("team/Tidy.yxmc"), &chain_macro(tool("2", SELECT)));

    let mut context = ResolutionContext::new(Vec::new());
    let mut policy = ScriptedPolicy::answering(vec![PolicyDecision::Directory(shared.clone())]);

    let first = resolve(&flows.join("a.yxmd"), &mut context, &mut policy);
    let second = resolve(&flows.join("b.yxmd"), &mut context, &mut policy);

    assert!(first.is_complete());
    assert!(second.is_complete());
    assert_eq!(policy.asked, vec!["Dedupe"]);
    assert_eq!(context.search_dirs(), &[shared]);
}

#[test]
fn test_nonexistent_file_answer_is_asked_again() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    let elsewhere = dir.path().join("elsewhere/Clean.yxmc");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Clean.yxmc"]));
    write(&elsewhere, &chain_macro(tool("2", FORMULA)));

    let mut context = ResolutionContext::new(Vec::new());
    let mut policy = ScriptedPolicy::answering(vec![
        PolicyDecision::File(PathBuf::from("/no/such/Clean.yxmc")),
        PolicyDecision::File(elsewhere),
    ]);

    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut policy);

    assert!(outcome.is_complete());
    assert_eq!(policy.asked.len(), 2);
}

#[test]
fn test_prompt_session_is_bounded() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Clean.yxmc"]));

    let bogus = PolicyDecision::File(PathBuf::from("/no/such/Clean.yxmc"));
    let mut context = ResolutionContext::new(Vec::new());
    let mut policy = ScriptedPolicy::answering(vec![bogus.clone(), bogus.clone(), bogus.clone(), bogus]);

    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut policy);

    assert_eq!(policy.asked.len(), 3);
    assert_eq!(outcome.issues[0].reason, UnresolvedReason::Skipped);
}

#[test]
fn test_malformed_macro_becomes_placeholder() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Broken.yxmc"]));
    write(&flows.join("macros/Broken.yxmc"), "<AlteryxDocument><Nodes>");

    let mut context = ResolutionContext::new(Vec::new());
    let mut policy = ScriptedPolicy::default();
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut policy);

    assert!(policy.asked.is_empty());
    assert!(matches!(outcome.issues[0].reason, UnresolvedReason::Malformed { .. }));
    assert!(outcome.document.node("10").unwrap().is_placeholder());
    assert!(!outcome.is_fatal());
}

#[test]
fn test_port_count_mismatch_becomes_placeholder() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Merge.yxmc"]));
    write(
        &flows.join("macros/Merge.yxmc"),
        &document(
            &[
                tool("1", MACRO_INPUT),
                tool("2", MACRO_INPUT),
                tool("3", FORMULA),
                tool("4", MACRO_OUTPUT),
            ],
            &[
                ("1", "Output", "3", "Input"),
                ("2", "Output", "3", "Input"),
                ("3", "Output", "4", "Input"),
            ],
        ),
    );

    let mut context = ResolutionContext::new(Vec::new());
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert_eq!(
        outcome.issues[0].reason,
        UnresolvedReason::PortArity {
            expected_inputs: 1,
            found_inputs: 2,
            expected_outputs: 1,
            found_outputs: 1,
        }
    );
    // The placeholder keeps its connections so lineage shows the gap
    assert_eq!(edges(&outcome), vec!["1->10", "10->99"]);
}

#[test]
fn test_nested_issues_point_at_spliced_placeholders() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Outer.yxmc"]));
    write(&flows.join("macros/Outer.yxmc"), &chain_macro(macro_call("2", "Inner.yxmc")));

    let mut context = ResolutionContext::new(Vec::new());
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert_eq!(outcome.issues.len(), 1);
    let issue = &outcome.issues[0];
    assert_eq!(issue.reference.name, "Inner");
    assert_eq!(issue.node, "10/2");
    assert!(issue.document.ends_with("flows/main.yxmd"));
    assert_eq!(issue.origin, "Outer#2");

    let location = issue.to_diagnostic().location.unwrap();
    assert!(location.file.ends_with("main.yxmd"));
    assert_eq!(location.node.as_deref(), Some("10/2"));

    let placeholder = outcome.document.node("10/2").unwrap();
    assert_eq!(placeholder.unresolved, Some(UnresolvedReason::Missing));
    assert_eq!(edges(&outcome), vec!["1->10/2", "10/2->99"]);
}

#[test]
fn test_definition_is_expanded_once_per_file() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    write(&flows.join("main.yxmd"), &workflow_calling(&["Clean.yxmc", r"macros\Clean.yxmc"]));
    write(&flows.join("macros/Clean.yxmc"), &chain_macro(tool("2", FORMULA)));

    let mut context = ResolutionContext::new(Vec::new());
    let outcome = resolve(&flows.join("main.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert!(outcome.is_complete());
    assert_eq!(outcome.expanded.len(), 2);
    assert_eq!(outcome.expanded[0].path, outcome.expanded[1].path);
    assert_eq!(context.cache().len(), 1);
}

#[test]
fn test_miss_in_one_directory_does_not_hide_a_local_copy() {
    let dir = TempDir::new().unwrap();
    write(&dir.path().join("team_a/a.yxmd"), &workflow_calling(&["Util.yxmc"]));
    write(&dir.path().join("team_b/b.yxmd"), &workflow_calling(&["Util.yxmc"]));
    write(&dir.path().join("team_b/macros/Util.yxmc"), &chain_macro(tool("2", FORMULA)));

    let mut context = ResolutionContext::new(Vec::new());
    let first = resolve(&dir.path().join("team_a/a.yxmd"), &mut context, &mut NonInteractivePolicy);
    let second = resolve(&dir.path().join("team_b/b.yxmd"), &mut context, &mut NonInteractivePolicy);

    assert_eq!(first.issues[0].reason, UnresolvedReason::Missing);
    assert!(second.is_complete());
    assert!(second.expanded[0].path.ends_with("team_b/macros/Util.yxmc"));
    assert_eq!(second.document.node("10/2").unwrap().category, ToolCategory::Formula);
}

#[test]
fn test_operator_skip_does_not_hide_a_local_copy() {
    let dir = TempDir::new().unwrap();
    write(&dir.path().join("team_a/a.yxmd"), &workflow_calling(&["Util.yxmc"]));
    write(&dir.path().join("team_a/c.yxmd"), &workflow_calling(&["Util.yxmc"]));
    write(&dir.path().join("team_b/b.yxmd"), &workflow_calling(&["Util.yxmc"]));
    write(&dir.path().join("team_b/macros/Util.yxmc"), &chain_macro(tool("2", FORMULA)));

    let mut context = ResolutionContext::new(Vec::new());
    let mut policy = ScriptedPolicy::answering(vec![PolicyDecision::SkipOne]);

    let first = resolve(&dir.path().join("team_a/a.yxmd"), &mut context, &mut policy);
    let second = resolve(&dir.path().join("team_b/b.yxmd"), &mut context, &mut policy);
    let third = resolve(&dir.path().join("team_a/c.yxmd"), &mut context, &mut policy);

    assert_eq!(policy.asked, vec!["Util"]);
    assert_eq!(first.issues[0].reason, UnresolvedReason::Skipped);
    assert!(second.is_complete());
    assert_eq!(third.issues[0].reason, UnresolvedReason::Skipped);
}
