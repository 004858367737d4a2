//! Publishers receive one [`Observation`] per experiment run.
//!
//! Publishing is fire-and-forget. [`dispatch`] calls [`Publisher::publish`]
//! right away, so whatever a publisher does synchronously has happened by the
//! time the experiment returns, then hands the future it got back to a
//! detached task. Errors and panics on either side of that split are logged
//! and counted, and never reach the experiment's caller.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tracing::{debug_span, error, info, warn};
use tracing_futures::Instrument;

use crate::{
    error::PublishError,
    observation::Observation,
    side::{panic_message, PanicPayload},
};

/// A sink for observations. Publishers may be called concurrently from many
/// in-flight experiments.
///
/// `publish` is called on the experiment's own thread. Work done before the
/// returned future is first polled is guaranteed to happen; the future itself
/// runs on a detached task and is not awaited by anyone.
pub trait Publisher: Send + Sync + 'static {
    fn publish(&self, observation: Observation) -> BoxFuture<'static, Result<(), PublishError>>;
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, observation: Observation) -> BoxFuture<'static, Result<(), PublishError>> {
        (**self).publish(observation)
    }
}

/// Discards every observation
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, _observation: Observation) -> BoxFuture<'static, Result<(), PublishError>> {
        futures::future::ok(()).boxed()
    }
}

/// Emits each observation as a `tracing` event. This is the default publisher.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPublisher;

impl Publisher for TracingPublisher {
    fn publish(&self, observation: Observation) -> BoxFuture<'static, Result<(), PublishError>> {
        if observation.matched() {
            info!(
                experiment = observation.experiment_name(),
                verdict = %observation.verdict(),
                control_duration = ?observation.control_duration(),
                candidate_duration = ?observation.candidate_duration(),
                "experiment observed",
            );
        } else {
            warn!(
                experiment = observation.experiment_name(),
                verdict = %observation.verdict(),
                control_failed = observation.control_failed(),
                candidate_failed = observation.candidate_failed(),
                control_duration = ?observation.control_duration(),
                candidate_duration = ?observation.candidate_duration(),
                "experiment observed a difference",
            );
        }

        futures::future::ok(()).boxed()
    }
}

/// Forwards observations into an unbounded channel
#[derive(Clone, Debug)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<Observation>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Observation>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        (Self { sender }, receiver)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, observation: Observation) -> BoxFuture<'static, Result<(), PublishError>> {
        let sent = self
            .sender
            .send(observation)
            .map_err(|_| PublishError::Closed);

        futures::future::ready(sent).boxed()
    }
}

/// Publish `observation` without waiting for the publisher to finish.
///
/// The returned future runs on the current tokio runtime when there is one.
/// Otherwise a dedicated thread drives it on its own single-threaded runtime.
pub fn dispatch(publisher: Arc<dyn Publisher>, observation: Observation) {
    let experiment = observation.experiment_name().to_owned();
    let span = debug_span!("publish", experiment = %experiment);

    let started = span.in_scope(|| {
        panic::catch_unwind(AssertUnwindSafe(|| publisher.publish(observation)))
    });
    let publishing = match started {
        Ok(publishing) => publishing,
        Err(payload) => {
            span.in_scope(|| publisher_panicked(&experiment, &payload));
            return;
        }
    };

    let task = async move {
        match AssertUnwindSafe(publishing).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "failed to publish observation");
                metrics::counter!("crosscheck_publish_failures_total", "experiment" => experiment)
                    .increment(1);
            }
            Err(payload) => publisher_panicked(&experiment, &payload),
        }
    }
    .instrument(span);

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => {
            let spawned = std::thread::Builder::new()
                .name("crosscheck-publish".into())
                .spawn(move || {
                    match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(task),
                        Err(err) => warn!(error = %err, "no runtime to publish observation on"),
                    }
                });

            if let Err(err) = spawned {
                warn!(error = %err, "failed to start publish thread");
            }
        }
    }
}

fn publisher_panicked(experiment: &str, payload: &PanicPayload) {
    error!(panic = panic_message(payload), "publisher panicked");
    metrics::counter!("crosscheck_publish_failures_total", "experiment" => experiment.to_owned())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::observation::Verdict;

    fn observation() -> Observation {
        Observation::new(
            "publish".into(),
            Verdict::Matched,
            Duration::from_millis(1),
            Duration::from_millis(2),
            false,
            false,
        )
    }

    struct PanicsOnCall;

    impl Publisher for PanicsOnCall {
        fn publish(&self, _: Observation) -> BoxFuture<'static, Result<(), PublishError>> {
            panic!("publisher blew up")
        }
    }

    struct PanicsWhenPolled;

    impl Publisher for PanicsWhenPolled {
        fn publish(&self, _: Observation) -> BoxFuture<'static, Result<(), PublishError>> {
            async {
                tokio::task::yield_now().await;
                if true {
                    panic!("publisher blew up later");
                }
                Ok::<(), PublishError>(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn tracing_publisher_accepts_every_verdict() {
        for verdict in [Verdict::Matched, Verdict::Mismatched, Verdict::BothFailed] {
            let observation = Observation::new(
                "tracing".into(),
                verdict,
                Duration::ZERO,
                Duration::ZERO,
                verdict == Verdict::BothFailed,
                verdict != Verdict::Matched,
            );

            assert!(TracingPublisher.publish(observation).await.is_ok());
        }
    }

    #[tokio::test]
    async fn channel_publisher_forwards() {
        let (publisher, mut receiver) = ChannelPublisher::new();

        dispatch(Arc::new(publisher), observation());

        let received = receiver.recv().await.unwrap();
        assert_eq!(received, observation());
    }

    #[tokio::test]
    async fn closed_channel_is_reported_as_closed() {
        let (publisher, receiver) = ChannelPublisher::new();
        drop(receiver);

        let result = publisher.publish(observation()).await;
        assert!(matches!(result, Err(PublishError::Closed)));
    }

    #[tokio::test]
    async fn publish_is_called_before_dispatch_returns() {
        let (publisher, mut receiver) = ChannelPublisher::new();

        dispatch(Arc::new(publisher), observation());

        // nothing has yielded to the runtime yet
        assert_eq!(receiver.try_recv().ok(), Some(observation()));
    }

    #[tokio::test]
    async fn panicking_publishers_are_isolated() {
        dispatch(Arc::new(PanicsOnCall), observation());
        dispatch(Arc::new(PanicsWhenPolled), observation());
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        // the runtime is still usable after both publishers panicked
        let (publisher, mut receiver) = ChannelPublisher::new();
        dispatch(Arc::new(publisher), observation());
        assert!(receiver.recv().await.is_some());
    }

    #[test]
    fn dispatch_without_runtime_uses_a_thread() {
        let (publisher, mut receiver) = ChannelPublisher::new();

        dispatch(Arc::new(publisher), observation());

        let received = receiver.blocking_recv();
        assert_eq!(received, Some(observation()));
    }
}
