use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use shared::protocol::{Message, MAX_DATAGRAM_SIZE};
use shared::types::{ServiceId, ServiceInfo, ServiceRecord};

use crate::address::AddressProvider;
use crate::config::DiontConfig;
use crate::engine::{Engine, RenounceTarget};
use crate::error::{DiontError, Result};
use crate::events::{Callback, ServiceEvent, SubscriptionId};
use crate::transport::Transport;

/// Commands sent to the instance task
enum Command {
    Announce(ServiceRecord, oneshot::Sender<Result<ServiceId>>),
    Renounce(RenounceTarget, oneshot::Sender<Result<()>>),
    RepeatAnnouncements(oneshot::Sender<()>),
    Query(oneshot::Sender<()>),
    Subscribe {
        event: ServiceEvent,
        callback: Callback,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        event: ServiceEvent,
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
    ServiceInfos(oneshot::Sender<Vec<ServiceInfo>>),
}

/// Handle to one discovery instance.
///
/// All registry mutation and listener dispatch happen on a single task, one
/// command or datagram at a time. The handle is cheap to clone; the task
/// stops on `shutdown` or when every handle has been dropped.
#[derive(Clone)]
pub struct Diont {
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl Diont {
    /// Start an instance on `transport`. Must be called inside a tokio
    /// runtime. A query is broadcast right away to learn the existing peers.
    pub fn spawn<T, A>(config: DiontConfig, transport: T, addresses: A) -> Self
    where
        T: Transport + 'static,
        A: AddressProvider + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();

        let actor = Actor {
            engine: Engine::new(),
            config,
            transport: Arc::new(transport),
            addresses: Box::new(addresses),
        };
        tokio::spawn(actor.run(rx, cancel.clone()));

        Self { tx, cancel }
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| DiontError::Shutdown)?;
        rx.await.map_err(|_| DiontError::Shutdown)
    }

    /// Announce one of our services. A record without a host gets the
    /// machine's address. Returns the composite id; announcing an id that
    /// is already known is a no-op returning the same id.
    pub async fn announce_service(&self, record: ServiceRecord) -> Result<ServiceId> {
        self.request(|reply| Command::Announce(record, reply)).await?
    }

    /// Renounce one of our services by id or by record. Unknown services and
    /// services owned by peers are ignored.
    pub async fn renounce_service(&self, target: impl Into<RenounceTarget>) -> Result<()> {
        let target = target.into();
        self.request(|reply| Command::Renounce(target, reply)).await?
    }

    /// Re-broadcast every service we announced
    pub async fn repeat_announcements(&self) -> Result<()> {
        self.request(Command::RepeatAnnouncements).await
    }

    /// Ask every peer to announce what it knows
    pub async fn query_for_services(&self) -> Result<()> {
        self.request(Command::Query).await
    }

    /// Register a listener. It runs on the instance task and must not await
    /// or block on this handle.
    pub async fn subscribe<F>(&self, event: ServiceEvent, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&ServiceInfo) + Send + Sync + 'static,
    {
        let callback: Callback = Box::new(callback);
        self.request(|reply| Command::Subscribe { event, callback, reply })
            .await
    }

    pub async fn unsubscribe(&self, event: ServiceEvent, id: SubscriptionId) -> Result<bool> {
        self.request(|reply| Command::Unsubscribe { event, id, reply })
            .await
    }

    /// Copy of every known service, ours and our peers'
    pub async fn service_infos(&self) -> Result<Vec<ServiceInfo>> {
        self.request(Command::ServiceInfos).await
    }

    /// Stop listening and release the transport. Own services are not
    /// renounced implicitly.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

struct Actor {
    engine: Engine,
    config: DiontConfig,
    transport: Arc<dyn Transport>,
    addresses: Box<dyn AddressProvider>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, cancel: CancellationToken) {
        tracing::info!("Diont instance {} started", self.engine.instance());

        let query = self.engine.query();
        self.send(Some(query)).await;

        let transport = self.transport.clone();
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                command = rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }

                received = transport.recv_from(&mut buf) => {
                    match received {
                        Ok((len, from)) => {
                            tracing::trace!("Datagram of {} bytes from {}", len, from);
                            let reply = self.engine.handle_datagram(&buf[..len]);
                            self.send(reply).await;
                        }
                        Err(e) => {
                            tracing::warn!("Receive failed: {}", e);
                            if e.kind() == std::io::ErrorKind::BrokenPipe {
                                break;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("Diont instance {} shutting down", self.engine.instance());
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Announce(record, reply) => {
                let result = self.engine.announce_service(record, self.addresses.as_ref());
                let result = match result {
                    Ok((id, outgoing)) => {
                        self.send(outgoing).await;
                        Ok(id)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::Renounce(target, reply) => {
                let result = match self.engine.renounce_service(target) {
                    Ok(outgoing) => {
                        self.send(outgoing).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::RepeatAnnouncements(reply) => {
                let outgoing = self.engine.repeat_announcements();
                self.send(outgoing).await;
                let _ = reply.send(());
            }
            Command::Query(reply) => {
                let query = self.engine.query();
                self.send(Some(query)).await;
                let _ = reply.send(());
            }
            Command::Subscribe { event, callback, reply } => {
                let _ = reply.send(self.engine.subscribe(event, callback));
            }
            Command::Unsubscribe { event, id, reply } => {
                let _ = reply.send(self.engine.unsubscribe(event, &id));
            }
            Command::ServiceInfos(reply) => {
                let _ = reply.send(self.engine.service_infos());
            }
        }
    }

    /// Encode and send; failures are logged, never returned.
    async fn send(&self, message: Option<Message>) {
        let Some(message) = message else {
            return;
        };

        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode message: {}", e);
                return;
            }
        };

        let destination = self.config.destination();
        if let Err(e) = self.transport.send_to(&payload, destination).await {
            tracing::warn!("Failed to send to {}: {}", destination, e);
        }
    }
}
