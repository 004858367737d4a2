use std::{future::Future, panic, sync::Arc};

use tracing::{debug, info_span};
use tracing_futures::Instrument;

use crate::{
    comparator::{self, AsyncFnComparator, Comparator, DefaultComparator, FnComparator},
    observation::{Observation, Verdict},
    order::{ExecutionOrder, OrderStrategy, RandomOrder},
    publisher::{self, Publisher, TracingPublisher},
    side::{run_side, SideOutcome, SideResult},
};

/// An experiment comparing a control and a candidate implementation of the
/// same operation.
///
/// `Control` and `Candidate` start out as `()` and become futures once
/// [`control`](Experiment::control) and [`candidate`](Experiment::candidate)
/// are called; [`run`](Experiment::run) is only available when both are set.
pub struct Experiment<Control = (), Candidate = (), Cmp = DefaultComparator, Order = RandomOrder> {
    name: String,
    control: Control,
    candidate: Candidate,
    comparator: Cmp,
    order: Order,
    publisher: Arc<dyn Publisher>,
}

impl Experiment {
    /// Start a new experiment. The name tags every observation it publishes
    /// and must not be empty.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "experiment name must not be empty");

        Self {
            name,
            control: (),
            candidate: (),
            comparator: DefaultComparator,
            order: RandomOrder,
            publisher: Arc::new(TracingPublisher),
        }
    }
}

impl<Control, Candidate, Cmp, Order> Experiment<Control, Candidate, Cmp, Order> {
    /// Set the trusted operation. Its result is what [`run`](Experiment::run)
    /// returns.
    pub fn control<F>(self, control: F) -> Experiment<F, Candidate, Cmp, Order> {
        Experiment {
            name: self.name,
            control,
            candidate: self.candidate,
            comparator: self.comparator,
            order: self.order,
            publisher: self.publisher,
        }
    }

    /// Set the operation under test. Its result is only ever compared.
    pub fn candidate<F>(self, candidate: F) -> Experiment<Control, F, Cmp, Order> {
        Experiment {
            name: self.name,
            control: self.control,
            candidate,
            comparator: self.comparator,
            order: self.order,
            publisher: self.publisher,
        }
    }

    /// Replace `PartialEq` with a custom [`Comparator`]
    pub fn comparator<C>(self, comparator: C) -> Experiment<Control, Candidate, C, Order> {
        Experiment {
            name: self.name,
            control: self.control,
            candidate: self.candidate,
            comparator,
            order: self.order,
            publisher: self.publisher,
        }
    }

    /// Compare the two values with a plain closure
    pub fn compare_with<F>(self, f: F) -> Experiment<Control, Candidate, FnComparator<F>, Order> {
        self.comparator(FnComparator(f))
    }

    /// Compare the two values with a closure returning a future
    pub fn compare_with_async<F>(
        self,
        f: F,
    ) -> Experiment<Control, Candidate, AsyncFnComparator<F>, Order> {
        self.comparator(AsyncFnComparator(f))
    }

    /// Choose how the execution order is drawn for each run
    pub fn order_strategy<S>(self, order: S) -> Experiment<Control, Candidate, Cmp, S> {
        Experiment {
            name: self.name,
            control: self.control,
            candidate: self.candidate,
            comparator: self.comparator,
            order,
            publisher: self.publisher,
        }
    }

    /// Send this experiment's observation to `publisher` instead of the log
    pub fn publisher<P: Publisher>(self, publisher: P) -> Self {
        self.publisher_arc(Arc::new(publisher))
    }

    /// Share one publisher between many experiments
    pub fn publisher_arc(self, publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher, ..self }
    }
}

impl<Control, Candidate, Cmp, Order, T, E> Experiment<Control, Candidate, Cmp, Order>
where
    Control: Future<Output = Result<T, E>>,
    Candidate: Future<Output = Result<T, E>>,
    Cmp: Comparator<T>,
    Order: OrderStrategy,
{
    /// Run both sides one after the other in a random order, publish the
    /// observation and return the control's result.
    ///
    /// The candidate's value, error or panic never reaches the caller. A
    /// control error is returned as is, and a control panic is resumed once
    /// the observation has been dispatched.
    pub async fn run(self) -> Result<T, E> {
        let Experiment {
            name,
            control,
            candidate,
            comparator,
            order,
            publisher,
        } = self;
        let span = info_span!("experiment", experiment = %name);

        async move {
            let order = order.pick_order();
            let (control, candidate) = match order {
                ExecutionOrder::ControlFirst => {
                    let control = run_side(control).await;
                    (control, run_side(candidate).await)
                }
                ExecutionOrder::CandidateFirst => {
                    let candidate = run_side(candidate).await;
                    (run_side(control).await, candidate)
                }
            };

            let verdict = {
                let control_value = control.outcome.value();
                let candidate_value = candidate.outcome.value();
                comparator::decide(control_value, candidate_value, &comparator).await
            };
            debug!(?order, %verdict, "experiment sides completed");
            record_metrics(&name, verdict, &control, &candidate);

            let observation = Observation::new(
                name,
                verdict,
                control.duration,
                candidate.duration,
                control.outcome.is_failure(),
                candidate.outcome.is_failure(),
            );
            publisher::dispatch(publisher, observation);

            match control.outcome {
                SideOutcome::Value(value) => Ok(value),
                SideOutcome::Error(err) => Err(err),
                SideOutcome::Panic(payload) => panic::resume_unwind(payload),
            }
        }
        .instrument(span)
        .await
    }
}

fn record_metrics<T, E>(
    name: &str,
    verdict: Verdict,
    control: &SideResult<T, E>,
    candidate: &SideResult<T, E>,
) {
    metrics::counter!(
        "crosscheck_experiment_runs_total",
        "experiment" => name.to_owned(),
        "verdict" => verdict.as_str()
    )
    .increment(1);

    metrics::histogram!(
        "crosscheck_side_duration_seconds",
        "experiment" => name.to_owned(),
        "side" => "control"
    )
    .record(control.duration.as_secs_f64());
    metrics::histogram!(
        "crosscheck_side_duration_seconds",
        "experiment" => name.to_owned(),
        "side" => "candidate"
    )
    .record(candidate.duration.as_secs_f64());

    if candidate.outcome.is_failure() {
        metrics::counter!("crosscheck_candidate_failures_total", "experiment" => name.to_owned())
            .increment(1);
    }
}
