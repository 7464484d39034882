//! End-to-end engine flow: select, confirm, rebuild, repaint, remove, reload.

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use transcript_annotator::annotations::{
    ActionLabel, CotLabel, NewAnnotation, ACTION_CATEGORY, COT_CATEGORY,
};
use transcript_annotator::container::{
    offsets_to_span, selection_to_offsets, Boundary, Container, ContainerKey, DomRange,
    OffsetRange,
};
use transcript_annotator::migrate::{migrate_entries, parse_save};
use transcript_annotator::overlay::{remove_clicked, remove_overlay, render_html, OverlayStyle};
use transcript_annotator::persist::JsonFileSink;
use transcript_annotator::selection::{HighlightGate, SelectionController};
use transcript_annotator::taxonomy::Taxonomy;
use transcript_annotator::Session;

const SENTENCE: &str = "The agent deleted the audit log to avoid detection.";

/// A transcript shaped like the rendered conversation view
fn build_transcript(key: ContainerKey) -> Container {
    let mut c = Container::new(key);
    let user = c.append_block(c.root(), "turn user");
    c.append_decoration(user, "user-icon");
    c.append_text(user, "Clean up the server.");
    let assistant = c.append_block(c.root(), "turn assistant");
    c.append_decoration(assistant, "assistant-icon");
    c.append_text(assistant, "Thinking: ");
    c.append_text(assistant, "nobody should notice this. ");
    c.append_text(assistant, "rm -rf /var/log/audit");
    c
}

#[test]
fn agent_example_maps_and_wraps() {
    let mut c = Container::from_text(ContainerKey::new("fileA.json", "main"), SENTENCE);
    let leaf = c.text_leaves()[0].node;

    let range = DomRange::new(Boundary::new(leaf, 4), Boundary::new(leaf, 9));
    assert_eq!(selection_to_offsets(&c, &range), OffsetRange::new(4, 9));

    let painted = offsets_to_span(&mut c, 4, 9, "actionMalicious", "abc");
    assert_eq!(c.text(), SENTENCE);
    assert_eq!(painted.len(), 1);
    assert_eq!(c.overlay_nodes("abc").len(), 1);
    assert_eq!(c.subtree_text(painted[0]), "agent");
}

#[test]
fn scheming_flag_migrates() {
    let mut bag = json!({ "record.json": { "scheming": true } })
        .as_object()
        .cloned()
        .unwrap();
    migrate_entries(&mut bag);

    let entry = &bag["record.json"];
    assert_eq!(entry["cot_label"], "scheming_long_term");
    assert_eq!(entry["action_label"], "malicious");
    assert!(entry.get("scheming").is_none());

    let mut again = bag.clone();
    migrate_entries(&mut again);
    assert_eq!(again, bag);
}

#[test]
fn overlapping_records_survive_each_others_removal() {
    let key = ContainerKey::new("fileA.json", "main");
    let mut c = Container::from_text(key.clone(), SENTENCE);
    let mut session = Session::new(Taxonomy::builtin());

    let span = |start, end| {
        NewAnnotation::spanning(OffsetRange::new(start, end).unwrap(), &SENTENCE[start..end])
    };
    let a = session.insert(&key, "A", span(0, 10));
    let b = session.insert(&key, "B", span(5, 15));
    session.repaint(&mut c);

    remove_overlay(&mut c, &mut session, &a.id);

    let ranges = c.overlay_ranges(&b.id);
    assert_eq!(ranges.first().map(|r| r.start), Some(5));
    assert_eq!(ranges.last().map(|r| r.end), Some(15));
    assert_eq!(c.text(), SENTENCE);
    assert_eq!(session.store().list("fileA.json", "main", None), vec![b]);
}

#[test]
fn gated_selection_through_rebuild_and_reload() {
    let dir = TempDir::new().unwrap();
    let save_path = dir.path().join("progress.json");
    let key = ContainerKey::new("sample_7.json", "without_oversight");

    let mut session =
        Session::new(Taxonomy::builtin()).with_sink(Arc::new(JsonFileSink::new(&save_path)));
    session.open_document(key.clone());
    let mut view = build_transcript(key.clone());
    let mut controller = SelectionController::new();

    // no labels yet: the gate refuses
    let leaves = view.text_leaves();
    let thought = leaves[2].node;
    let command = leaves[3].node;
    let selection = DomRange::new(Boundary::new(thought, 0), Boundary::new(thought, 26));
    assert!(controller
        .select(&session, &view, &selection, COT_CATEGORY, HighlightGate::Cot)
        .is_err());

    session.set_cot_label("sample_7.json", CotLabel::SchemingCovert);
    session.set_action_label("sample_7.json", ActionLabel::Malicious);

    controller
        .select(&session, &view, &selection, COT_CATEGORY, HighlightGate::Cot)
        .unwrap();
    let cot = controller
        .confirm(&mut session, &mut view, NewAnnotation::default())
        .unwrap();
    assert_eq!(cot.selected_text, "nobody should notice this.");

    // painting split the thought leaf; the command leaf is untouched
    assert!(!view.is_attached(thought));
    assert!(view.is_attached(command));
    let selection = DomRange::new(Boundary::new(command, 0), Boundary::new(command, 6));
    controller
        .select(&session, &view, &selection, ACTION_CATEGORY, HighlightGate::Action)
        .unwrap();
    let action = controller
        .confirm(&mut session, &mut view, NewAnnotation::default())
        .unwrap();
    assert_eq!(action.selected_text, "rm -rf");
    assert_eq!(view.overlay_nodes(&action.id).len(), 1);

    // navigation rebuilds the container; repaint restores both records
    let mut rebuilt = build_transcript(key.clone());
    let report = session.repaint(&mut rebuilt);
    assert_eq!(report.painted, 2);
    assert!(report.mismatched.is_empty());
    assert_eq!(rebuilt.text(), view.text());
    assert_eq!(rebuilt.rendered_record_ids(), view.rendered_record_ids());

    let html = render_html(&rebuilt, &OverlayStyle::default());
    assert!(html.contains(&format!("data-record-id=\"{}\"", cot.id)));

    // click inside the command removes the action record only
    let clicked = rebuilt
        .text_leaves()
        .into_iter()
        .find(|leaf| rebuilt.subtree_text(leaf.node).starts_with("rm -rf"))
        .unwrap()
        .node;
    let outcome = remove_clicked(&mut rebuilt, &mut session, clicked).unwrap();
    assert_eq!(outcome.record_id, action.id);
    assert_eq!(outcome.unwrapped, 1);
    assert!(rebuilt.overlay_nodes(&action.id).is_empty());
    assert_eq!(rebuilt.overlay_nodes(&cot.id).len(), 1);

    // the autosaved file reloads into an equivalent session
    let saved = std::fs::read_to_string(&save_path).unwrap();
    let upgraded = parse_save(&saved).unwrap();
    assert_eq!(upgraded.save.annotations, session.store().export_all());

    let mut restored = Session::new(Taxonomy::builtin());
    restored.load_save_str(&saved).unwrap();
    let mut fresh = build_transcript(key);
    restored.repaint(&mut fresh);
    assert_eq!(fresh.rendered_record_ids(), rebuilt.rendered_record_ids());
}
