//! Property-based tests for preview accuracy
//! **Feature: genforge-generation, Property 2: Preview Predicts The Render**
//!
//! A preview never writes. A forced render afterwards creates exactly the
//! files the preview classified as `create` and leaves every `noop` file
//! byte-for-byte as it was.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use genforge_generation::{PreviewPlanner, RenameRuleSet, RenderOptions, TemplateRenderer};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Existing {
    Absent,
    Same,
    Different,
}

fn existing() -> impl Strategy<Value = Existing> {
    prop_oneof![
        Just(Existing::Absent),
        Just(Existing::Same),
        Just(Existing::Different),
    ]
}

fn template_tree() -> impl Strategy<Value = BTreeMap<String, (String, Existing)>> {
    prop::collection::btree_map(
        r"[a-z]{1,6}(/[a-z]{1,6})?\.txt",
        (r"[a-zA-Z0-9 \n]{0,40}", existing()),
        1..8,
    )
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let content = std::fs::read(&path).unwrap();
                files.insert(path.strip_prefix(root).unwrap().to_path_buf(), content);
            }
        }
    }
    files
}

fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
}

#[test]
fn prop_preview_matches_forced_render() {
    proptest!(|(tree in template_tree())| {
        let temp = tempfile::tempdir().unwrap();
        let templates = temp.path().join("templates");
        let target = temp.path().join("project");
        std::fs::create_dir_all(&target).unwrap();

        for (rel, (content, existing)) in &tree {
            let source = templates.join(rel);
            std::fs::create_dir_all(source.parent().unwrap()).unwrap();
            std::fs::write(&source, content).unwrap();

            let dest = target.join(rel);
            match existing {
                Existing::Absent => {}
                Existing::Same => {
                    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
                    std::fs::write(&dest, content).unwrap();
                }
                Existing::Different => {
                    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
                    std::fs::write(&dest, format!("{content}#")).unwrap();
                }
            }
        }

        let rules = RenameRuleSet::new();
        let context = json!({});
        let rt = tokio::runtime::Runtime::new().unwrap();

        let before = snapshot(&target);
        let report = rt
            .block_on(PreviewPlanner::default().preview(
                &templates,
                &target,
                &context,
                &rules,
                &RenderOptions::default(),
            ))
            .unwrap();
        prop_assert_eq!(&snapshot(&target), &before);
        prop_assert_eq!(report.counts.total, tree.len());

        let options = RenderOptions { force: true, ..RenderOptions::default() };
        let result = rt
            .block_on(TemplateRenderer::new().render(&templates, &target, &context, &rules, &options))
            .unwrap();

        prop_assert_eq!(sorted(result.files_created), sorted(report.creates));
        prop_assert_eq!(sorted(result.files_unchanged), sorted(report.noops.clone()));
        let mut existing = report.modifies.clone();
        existing.extend(report.noops.clone());
        prop_assert_eq!(sorted(result.files_overwritten), sorted(existing));

        for noop in &report.noops {
            prop_assert_eq!(&std::fs::read(target.join(noop)).unwrap(), &before[noop]);
        }

        for (rel, (content, _)) in &tree {
            prop_assert_eq!(&std::fs::read_to_string(target.join(rel)).unwrap(), content);
        }
    });
}

#[test]
fn prop_dry_run_render_writes_nothing() {
    proptest!(|(tree in template_tree())| {
        let temp = tempfile::tempdir().unwrap();
        let templates = temp.path().join("templates");
        let target = temp.path().join("project");
        std::fs::create_dir_all(&target).unwrap();
        for (rel, (content, _)) in &tree {
            let source = templates.join(rel);
            std::fs::create_dir_all(source.parent().unwrap()).unwrap();
            std::fs::write(&source, content).unwrap();
        }

        let options = RenderOptions { dry_run: true, ..RenderOptions::default() };
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt
            .block_on(TemplateRenderer::new().render(
                &templates,
                &target,
                &json!({}),
                &RenameRuleSet::new(),
                &options,
            ))
            .unwrap();

        prop_assert!(result.dry_run);
        prop_assert_eq!(result.files_created.len(), tree.len());
        prop_assert!(snapshot(&target).is_empty());
    });
}
