use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use diont::{Diont, ServiceEvent};
use shared::types::ServiceInfo;
use crate::config::AnnounceConfig;
use crate::view::{hash, history::EventHistory};

pub type EventSender = flume::Sender<(ServiceEvent, ServiceInfo)>;
pub type EventReceiver = flume::Receiver<(ServiceEvent, ServiceInfo)>;

/// Subscribe to both events, forwarding them into a channel the async
/// side can consume. Listeners run on the instance task and must not await.
pub async fn subscribe_all(diont: &Diont) -> Result<EventReceiver> {
    let (tx, rx) = flume::unbounded();

    for event in [ServiceEvent::ServiceAnnounced, ServiceEvent::ServiceRenounced] {
        let tx: EventSender = tx.clone();
        diont
            .subscribe(event, move |info| {
                let _ = tx.send((event, info.clone()));
            })
            .await?;
    }

    Ok(rx)
}

/// Recompute the registry fingerprint and publish it if it changed
pub async fn refresh_hash(diont: &Diont, hash_tx: &watch::Sender<String>) -> Result<()> {
    let services = diont.service_infos().await?;
    let new_hash = hash::compute_hash(&services);
    hash_tx.send_if_modified(|current| {
        if *current == new_hash {
            return false;
        }
        *current = new_hash;
        true
    });
    Ok(())
}

/// Event bridge loop - records listener events, keeps the fingerprint
/// current and re-announces our services on an interval
pub async fn run(
    diont: Diont,
    rx: EventReceiver,
    history: Arc<RwLock<EventHistory>>,
    hash_tx: watch::Sender<String>,
    config: AnnounceConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let repeat_enabled = config.repeat_interval_secs > 0;
    let mut repeat_interval = tokio::time::interval(
        Duration::from_secs(config.repeat_interval_secs.max(1))
    );
    // The first tick completes immediately; startup already announced.
    repeat_interval.tick().await;

    loop {
        tokio::select! {
            event = rx.recv_async() => {
                let Ok((event, info)) = event else {
                    tracing::info!("Event channel closed");
                    break;
                };
                tracing::info!("{}: {}", event, info.id());

                let recorded = {
                    let mut history = history.write().await;
                    history.record(event, info);
                    history.len()
                };
                tracing::debug!("{} events in history", recorded);

                if let Err(e) = refresh_hash(&diont, &hash_tx).await {
                    tracing::error!("Failed to refresh service hash: {}", e);
                }
            }
            _ = repeat_interval.tick(), if repeat_enabled => {
                if let Err(e) = diont.repeat_announcements().await {
                    tracing::error!("Failed to repeat announcements: {}", e);
                }
                if let Err(e) = refresh_hash(&diont, &hash_tx).await {
                    tracing::error!("Failed to refresh service hash: {}", e);
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Event bridge shutting down");
                break;
            }
        }
    }

    Ok(())
}
