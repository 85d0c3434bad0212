//! Informer: drives a watch stream into a cache and fans changes out to
//! Event Routers.

use crate::cache::CacheWriter;
use crate::router::EventRouter;
use crate::shutdown::Shutdown;
use futures::{Stream, StreamExt};
use kube::{Api, Resource};
use kube_runtime::{watcher, WatchStreamExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// Watch stream for `api` with the default reconnect backoff.
pub fn watch_stream<K>(
    api: Api<K>,
    config: watcher::Config,
) -> impl Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    watcher(api, config).default_backoff()
}

/// Owns the write side of one cache and the routers interested in it.
pub struct Informer<K> {
    name: String,
    writer: CacheWriter<K>,
    routers: Vec<EventRouter<K>>,
}

impl<K: Resource + 'static> Informer<K> {
    pub fn new(name: impl Into<String>, writer: CacheWriter<K>) -> Self {
        Self {
            name: name.into(),
            writer,
            routers: Vec::new(),
        }
    }

    #[must_use]
    pub fn route_to(mut self, router: EventRouter<K>) -> Self {
        self.routers.push(router);
        self
    }

    /// Applies one event to the cache and routes what changed. Returns the
    /// number of notifications produced.
    pub fn dispatch(&mut self, event: watcher::Event<K>) -> usize {
        let notifications = self.writer.apply(event);
        for notification in &notifications {
            debug!(
                informer = %self.name,
                kind = notification.kind(),
                name = notification.object().meta().name.as_deref().unwrap_or("<unknown>"),
                "Change observed"
            );
            for router in &self.routers {
                router.route(notification);
            }
        }
        notifications.len()
    }

    /// Consumes `stream` until it ends or shutdown is requested.
    pub async fn run<S>(mut self, stream: S, shutdown: Shutdown)
    where
        S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
    {
        info!("Starting {} informer", self.name);
        let mut stream = std::pin::pin!(stream);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("{} informer stopping", self.name);
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        self.dispatch(event);
                    }
                    Some(Err(e)) => {
                        warn!("{} watch error, retrying: {}", self.name, e);
                    }
                    None => {
                        warn!("{} watch stream ended", self.name);
                        break;
                    }
                },
            }
        }
    }
}

impl<K> Debug for Informer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Informer")
            .field("name", &self.name)
            .field("routers", &self.routers.len())
            .finish_non_exhaustive()
    }
}
