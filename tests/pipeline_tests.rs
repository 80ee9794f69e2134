mod common;

use common::{arc, CannedEnricher, CannedSource};
use product_lookup::pipeline::{ExecutionOutcome, PipelineContext, PipelineRunner};
use product_lookup::plugins::{ExternalPluginFactory, ProcessPluginFactory, ProductLookupPlugin};
use product_lookup::types::SearchType;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn barcode_context() -> PipelineContext {
    PipelineContext::new("761720051108", SearchType::Barcode, 10)
}

#[tokio::test]
async fn test_equivalent_barcodes_from_two_plugins_merge_into_one_entry() {
    let plugins = vec![
        arc(CannedSource::new("catalog", "761720051108", "Sparkling Water")),
        arc(CannedEnricher {
            id: "brands",
            barcode: "0761720051108",
            brand: "Acme",
        }),
    ];

    let mut context = barcode_context();
    let executions = PipelineRunner::new()
        .run(&plugins, &mut context, &CancellationToken::new())
        .await;

    assert!(executions.iter().all(|e| e.outcome.is_completed()));
    assert_eq!(context.len(), 1);

    let result = &context.results()[0];
    assert!(result.has_source("catalog"));
    assert!(result.has_source("brands"));
    assert_eq!(result.barcode.as_deref(), Some("761720051108"));
    assert_eq!(result.name.as_deref(), Some("Sparkling Water"));
    assert_eq!(result.brand_name.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn test_first_configured_plugin_wins_conflicting_fields() {
    let run = |first: &'static str, second: &'static str| async move {
        let plugins = vec![
            arc(CannedSource::new(first, "761720051108", first)),
            arc(CannedSource::new(second, "0761720051108", second)),
        ];
        let mut context = barcode_context();
        PipelineRunner::new()
            .run(&plugins, &mut context, &CancellationToken::new())
            .await;
        context.into_results()
    };

    let forward = run("Cola Classic", "Classic Cola").await;
    assert_eq!(forward.len(), 1);
    assert_eq!(forward[0].name.as_deref(), Some("Cola Classic"));
    assert_eq!(forward[0].categories, vec!["Cola Classic", "Classic Cola"]);

    let swapped = run("Classic Cola", "Cola Classic").await;
    assert_eq!(swapped.len(), 1);
    assert_eq!(swapped[0].name.as_deref(), Some("Classic Cola"));
}

#[tokio::test]
async fn test_failing_plugin_does_not_stop_the_run() {
    let healthy = CannedSource::new("healthy", "761720051108", "Cola");
    let healthy_calls = healthy.calls();
    let plugins = vec![arc(CannedSource::failing("broken", "quota exceeded")), arc(healthy)];

    let mut context = barcode_context();
    let executions = PipelineRunner::new()
        .run(&plugins, &mut context, &CancellationToken::new())
        .await;

    assert_eq!(healthy_calls.load(Ordering::SeqCst), 1);
    assert!(
        matches!(&executions[0].outcome, ExecutionOutcome::Failed(msg) if msg.contains("quota exceeded"))
    );
    assert!(executions[1].outcome.is_completed());
    assert_eq!(context.len(), 1);
}

#[tokio::test]
async fn test_cancelled_lookup_skips_every_plugin() {
    let source = CannedSource::new("catalog", "761720051108", "Cola");
    let calls = source.calls();
    let plugins = vec![
        arc(source),
        arc(CannedEnricher {
            id: "brands",
            barcode: "761720051108",
            brand: "Acme",
        }),
    ];

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut context = barcode_context();
    let executions = PipelineRunner::new().run(&plugins, &mut context, &cancel).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(executions.len(), 2);
    for execution in &executions {
        assert_eq!(execution.outcome, ExecutionOutcome::Skipped("cancelled".to_string()));
    }
    assert!(context.is_empty());
}

#[tokio::test]
async fn test_enrichment_adds_only_while_room_remains() {
    let plugins = vec![
        arc(CannedSource::new("catalog", "96385074", "Gum")),
        arc(CannedEnricher {
            id: "brands",
            barcode: "761720051108",
            brand: "Acme",
        }),
    ];

    let mut context = PipelineContext::new("gum", SearchType::Name, 1);
    let executions = PipelineRunner::new()
        .run(&plugins, &mut context, &CancellationToken::new())
        .await;

    assert_eq!(context.len(), 1);
    assert_eq!(context.results()[0].barcode.as_deref(), Some("96385074"));
    assert!(executions[1].outcome.is_completed());
    assert_eq!(executions[1].results_before, executions[1].results_after);
}

#[cfg(unix)]
fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn test_external_enrichment_plugin_merges_into_source_result() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "local_catalog.sh",
        r#"
case "$1" in
  describe) echo '{"pluginId":"local_catalog","mode":"enrichment"}' ;;
  lookup) cat > /dev/null; echo '[{"dataSources":{"local_catalog":"sku-1"},"barcode":"0761720051108","brandName":"Acme"}]' ;;
  *) exit 2 ;;
esac"#,
    );
    let external: Arc<dyn ProductLookupPlugin> = Arc::from(
        ProcessPluginFactory::default()
            .resolve_plugin(script.to_str().unwrap())
            .await
            .unwrap(),
    );

    let plugins = vec![
        arc(CannedSource::new("catalog", "761720051108", "Sparkling Water")),
        external,
    ];
    let mut context = barcode_context();
    let executions = PipelineRunner::new()
        .run(&plugins, &mut context, &CancellationToken::new())
        .await;

    assert!(executions.iter().all(|e| e.outcome.is_completed()));
    assert_eq!(context.len(), 1);
    let result = &context.results()[0];
    assert!(result.has_source("catalog"));
    assert_eq!(result.data_sources["local_catalog"], "sku-1");
    assert_eq!(result.name.as_deref(), Some("Sparkling Water"));
    assert_eq!(result.brand_name.as_deref(), Some("Acme"));
}
