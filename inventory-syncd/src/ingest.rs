use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use crate::reconcile::Reconciler;
use crate::store_manager::StoreHandle;

/// Ingestion consumer: drains raw discovery payloads one at a time, storing
/// and then reconciling each policy table before taking the next payload.
pub async fn run(
    store: StoreHandle,
    mut reconciler: Reconciler,
    mut rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Ingest consumer shutting down");
                break;
            }
            msg = rx.recv() => match msg {
                Some(raw) => handle_payload(&store, &mut reconciler, &raw).await,
                None => {
                    tracing::info!("Ingest channel closed");
                    break;
                }
            },
        }
    }

    Ok(())
}

/// Process one `{ "<policy>": { "<table>": [...], "config": {...} } }` payload.
pub async fn handle_payload(store: &StoreHandle, reconciler: &mut Reconciler, raw: &[u8]) {
    let payload: Value = match serde_json::from_slice(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable payload");
            return;
        }
    };
    let Value::Object(policies) = payload else {
        tracing::warn!("Dropping payload that is not a JSON object");
        return;
    };

    for (policy, inner) in policies {
        let saved = match store.save(policy.clone(), inner).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(policy = %policy, error = %e, "Failed to store observed batch");
                continue;
            }
        };
        if !saved.errors.is_empty() {
            tracing::warn!(policy = %policy, failed = saved.errors.len(), errors = %saved.errors, "Some items were not stored");
        }
        if saved.records.is_empty() {
            continue;
        }

        let kind = saved.records.kind();
        let count = saved.records.len();
        match reconciler.reconcile(saved.records).await {
            Ok(()) => tracing::info!(policy = %policy, kind = %kind, count, "Batch reconciled"),
            Err(errors) => tracing::warn!(
                policy = %policy,
                kind = %kind,
                count,
                failed = errors.len(),
                errors = %errors,
                "Batch reconciled with failures"
            ),
        }
    }
}
