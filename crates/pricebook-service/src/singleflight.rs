use std::fmt;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::utils::CallOnDrop;

type Producer<T, E> = Box<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

// Broadcasting the settled result to every joined caller requires a shareable
// channel; `Shared` hands each caller its own clone of the received value.
type FlightChannel<T, E> = Shared<oneshot::Receiver<Result<T, E>>>;

/// Deduplicates concurrent invocations of an asynchronous producer.
///
/// At most one producer call is pending at a time: the first caller of
/// [`run`](Self::run) spawns it, and every caller arriving before it settles
/// joins that exact invocation. Once it settles (with a value or an error),
/// each joined caller receives its own clone of the outcome and the slot is
/// cleared, so the next call starts a fresh invocation. Failures are never
/// cached.
///
/// The invocation is spawned as a separate task, so it runs to completion
/// even if the callers that joined it are dropped.
pub struct SingleFlight<T, E> {
    /// Name of the operation, used for diagnostics only.
    name: &'static str,
    produce: Producer<T, E>,
    in_flight: Arc<Mutex<Option<FlightChannel<T, E>>>>,
}

impl<T, E> fmt::Debug for SingleFlight<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .in_flight
            .try_lock()
            .map(|slot| slot.is_some())
            .unwrap_or_default();
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("pending", &pending)
            .finish()
    }
}

impl<T, E> SingleFlight<T, E>
where
    // `Sync` is needed on top of `Send` because the in-flight slot (holding
    // a `Shared` over the result) travels into the clear-on-drop callback of
    // the producer task.
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<oneshot::Canceled> + 'static,
{
    pub fn new<F>(name: &'static str, produce: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static,
    {
        Self {
            name,
            produce: Box::new(produce),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs the producer, or joins the invocation that is already pending.
    pub async fn run(&self) -> Result<T, E> {
        let channel = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.as_ref() {
                Some(channel) => {
                    tracing::trace!("joining in-flight {} call", self.name);
                    channel.clone()
                }
                None => {
                    let channel = self.start();
                    *in_flight = Some(channel.clone());
                    channel
                }
            }
        };

        match channel.await {
            Ok(result) => result,
            // The producer task was dropped before sending, which only
            // happens when the runtime shuts down.
            Err(canceled) => Err(E::from(canceled)),
        }
    }

    /// Spawns the producer as a separate task and returns a shareable
    /// channel for its eventual result.
    fn start(&self) -> FlightChannel<T, E> {
        tracing::trace!("starting {} call", self.name);
        let (sender, receiver) = oneshot::channel();

        let computation = (self.produce)();
        let in_flight = Arc::clone(&self.in_flight);
        let clear_token = CallOnDrop::new(move || {
            *in_flight.lock().unwrap() = None;
        });

        tokio::spawn(async move {
            let result = computation.await;
            // Drop the token first to clear the slot. This ensures that
            // callers either get a channel that will receive data, or they
            // start a new invocation.
            drop(clear_token);
            sender.send(result).ok();
        });

        receiver.shared()
    }
}
