//! Integration tests for `status`, from template files on disk through to
//! printed changesets.

mod common;

use std::{fs, path::PathBuf};

use common::{settings, FileRenderer, MockCluster};
use indoc::indoc;
use ocdiff::commands::{
	status::{status, Drift},
	util::ReconcileArgs,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const LOCAL: &str = indoc! {"
	kind: ConfigMap
	metadata:
	  name: settings
	  labels:
	    app: web
	data:
	  mode: prod
	---
	kind: Service
	metadata:
	  name: web
	  labels:
	    app: web
	spec:
	  ports:
	  - port: 80
	    targetPort: 8080
"};

fn templates(files: &[(&str, &str)]) -> TempDir {
	let dir = TempDir::new().unwrap();
	for (name, content) in files {
		fs::write(dir.path().join(name), content).unwrap();
	}
	dir
}

fn remote_settings(mode: &str) -> Value {
	json!({
		"kind": "ConfigMap",
		"metadata": {
			"name": "settings",
			"namespace": "shop",
			"uid": "0b6d3c1e",
			"resourceVersion": "4711",
			"labels": { "app": "web" }
		},
		"data": { "mode": mode }
	})
}

fn remote_web() -> Value {
	json!({
		"kind": "Service",
		"metadata": {
			"name": "web",
			"creationTimestamp": "2024-01-01T00:00:00Z",
			"labels": { "app": "web" },
			"annotations": { "openshift.io/generated-by": "OpenShiftNewApp" }
		},
		"spec": {
			"clusterIP": "172.30.12.7",
			"ports": [{ "port": 80, "targetPort": 8080 }]
		},
		"status": { "loadBalancer": {} }
	})
}

fn remote_legacy() -> Value {
	json!({ "kind": "ConfigMap", "metadata": { "name": "legacy" }, "data": { "old": "yes" } })
}

fn run(dir: &TempDir, cluster: &MockCluster, args: ReconcileArgs) -> (anyhow::Result<Drift>, String) {
	let mut out = Vec::new();
	let result = status(
		&settings(dir.path()),
		&args,
		&FileRenderer::default(),
		cluster,
		&mut out,
	);
	(result, String::from_utf8(out).unwrap())
}

fn total_row(output: &str) -> Vec<&str> {
	output
		.lines()
		.find(|l| l.starts_with("TOTAL"))
		.expect("summary has a total row")
		.split_whitespace()
		.collect()
}

#[test]
fn test_drift_is_reported() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let cluster = MockCluster::with_resources([remote_settings("dev"), remote_web(), remote_legacy()]);

	let (result, output) = run(&dir, &cluster, ReconcileArgs::default());

	assert_eq!(result.unwrap(), Drift::Drifted);
	assert!(output.contains("~ settings to be updated\n"));
	assert!(output.contains("-  mode: dev\n+  mode: prod\n"));
	assert!(output.contains("* web is in sync\n"));
	assert!(output.contains("- legacy to be deleted\n"));
	assert!(output.contains("--- a/ConfigMap/legacy\n+++ /dev/null\n"));
	assert_eq!(total_row(&output), vec!["TOTAL", "1", "0", "1", "1"]);
	assert!(cluster.calls().is_empty());
}

#[test]
fn test_in_sync_despite_server_managed_fields() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let cluster = MockCluster::with_resources([remote_settings("prod"), remote_web()]);

	let (result, output) = run(&dir, &cluster, ReconcileArgs::default());

	assert_eq!(result.unwrap(), Drift::InSync);
	assert!(output.contains("* settings is in sync\n"));
	assert!(output.contains("* web is in sync\n"));
	assert!(!output.contains("---"));
}

#[test]
fn test_kinds_are_printed_in_apply_order() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let cluster = MockCluster::default();

	let (_, output) = run(&dir, &cluster, ReconcileArgs::default());

	let config_map = output.find("ConfigMap resources").unwrap();
	let service = output.find("Service resources").unwrap();
	let route = output.find("Route resources").unwrap();
	assert!(config_map < service && service < route);
}

#[test]
fn test_upsert_only_never_deletes() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let cluster = MockCluster::with_resources([remote_settings("prod"), remote_web(), remote_legacy()]);

	let args = ReconcileArgs {
		upsert_only: true,
		..Default::default()
	};
	let (result, output) = run(&dir, &cluster, args);

	assert_eq!(result.unwrap(), Drift::InSync);
	assert!(!output.contains("legacy"));
}

#[test]
fn test_resource_argument_restricts_kinds_and_names() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let cluster = MockCluster::with_resources([remote_settings("dev"), remote_legacy()]);

	let args = ReconcileArgs {
		resource: Some("cm/settings".to_string()),
		..Default::default()
	};
	let (result, output) = run(&dir, &cluster, args);

	assert_eq!(result.unwrap(), Drift::Drifted);
	assert!(output.contains("~ settings to be updated\n"));
	assert!(!output.contains("legacy"));
	assert!(!output.contains("Service resources"));
}

#[test]
fn test_selector_filters_both_sides() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let cluster = MockCluster::with_resources([remote_settings("prod"), remote_web(), remote_legacy()]);

	let mut settings = settings(dir.path());
	settings.selector = Some("app=web".to_string());
	let mut out = Vec::new();
	let result = status(
		&settings,
		&ReconcileArgs::default(),
		&FileRenderer::default(),
		&cluster,
		&mut out,
	);

	assert_eq!(result.unwrap(), Drift::InSync);
	assert!(!String::from_utf8(out).unwrap().contains("legacy"));
}

#[test]
fn test_set_based_selector_is_rejected() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let cluster = MockCluster::with_resources([remote_settings("dev")]);

	let mut settings = settings(dir.path());
	settings.selector = Some("app in (web)".to_string());
	let mut out = Vec::new();
	let result = status(
		&settings,
		&ReconcileArgs::default(),
		&FileRenderer::default(),
		&cluster,
		&mut out,
	);

	let err = result.unwrap_err();
	assert!(format!("{err:#}").contains("invalid label selector `app in (web)`"));
	assert!(out.is_empty());
}

#[test]
fn test_param_files_are_found_next_to_templates() {
	let dir = templates(&[("app.yml", LOCAL), ("app.env", "MODE=prod\n")]);
	let renderer = FileRenderer::default();
	let args = ReconcileArgs {
		params: vec!["REPLICAS=2".to_string()],
		labels: Some("team=payments".to_string()),
		..Default::default()
	};

	let mut out = Vec::new();
	status(
		&settings(dir.path()),
		&args,
		&renderer,
		&MockCluster::default(),
		&mut out,
	)
	.unwrap();

	let requests = renderer.requests();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].template, dir.path().join("app.yml"));
	assert_eq!(requests[0].param_file, Some(dir.path().join("app.env")));
	assert_eq!(requests[0].params, vec!["REPLICAS=2"]);
	assert_eq!(requests[0].labels.as_deref(), Some("team=payments"));
}

#[test]
fn test_param_file_conflicts_with_param_dir() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let args = ReconcileArgs {
		param_file: Some(PathBuf::from("prod.env")),
		..Default::default()
	};

	let (result, _) = run(&dir, &MockCluster::default(), args);

	let err = result.unwrap_err();
	assert!(format!("{err:#}").contains("cannot specify both --param-dir and --param-file"));
}

#[test]
fn test_unknown_kind_is_rejected() {
	let dir = templates(&[("app.yml", LOCAL)]);
	let args = ReconcileArgs {
		resource: Some("deployment/web".to_string()),
		..Default::default()
	};

	let (result, output) = run(&dir, &MockCluster::default(), args);

	assert!(result.is_err());
	assert!(output.is_empty());
}

#[test]
fn test_unreconcilable_kind_fails_after_printing_the_rest() {
	let broken = indoc! {"
		kind: ConfigMap
		metadata:
		  labels:
		    app: web
		data:
		  mode: prod
		---
		kind: Service
		metadata:
		  name: web
		spec:
		  ports:
		  - port: 80
		    targetPort: 8080
	"};
	let dir = templates(&[("app.yml", broken)]);
	let cluster = MockCluster::with_resources([remote_web()]);

	let (result, output) = run(&dir, &cluster, ReconcileArgs::default());

	let err = result.unwrap_err();
	assert!(err.to_string().contains("ConfigMap"));
	assert!(output.contains("! normalizing local ConfigMap"));
	assert!(output.contains("Service resources"));
}
