use futures::stream::StreamExt;
use smfc_core::{PathLayer, Result, SmfcError};
use smfc_metrics::{
    CONTINUATIONS_PENDING, DISCARDS_TOTAL, DISPATCH_LATENCY_SECONDS, EVENTS_TOTAL,
    POLICY_FAILURES_TOTAL, POLICY_TIMEOUTS_TOTAL, SESSIONS_ACTIVE,
};
use smfc_shared::{Teid, XactId};
use smfc_sm_core::{
    Dispatcher, DropReason, Lifecycle, LifecycleState, SessionHandler, SmfAction, SmfEvent,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, error, info, warn};

/// Entries of the actor's delay queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    /// Policy answer for a parked request
    Policy { teid: Teid, xact: XactId },
    /// Transaction a handler left open
    Transaction { teid: Teid, xact: XactId },
}

/// Single-writer event loop owning the session core and both paths
pub struct SmfActor<H, G, P> {
    lifecycle: Lifecycle,
    dispatcher: Dispatcher<H>,
    gtp_path: G,
    pfcp_path: P,
    receiver: mpsc::Receiver<SmfEvent>,

    // タイムアウト管理: 期限切れで TransactionTimeout を投入する
    timeout_queue: DelayQueue<Deadline>,
    timer_keys: HashMap<Teid, delay_queue::Key>,
    xact_keys: HashMap<XactId, delay_queue::Key>,
    policy_timeout: Duration,
    transaction_timeout: Duration,
}

impl<H, G, P> SmfActor<H, G, P>
where
    H: SessionHandler,
    G: PathLayer,
    P: PathLayer,
{
    pub fn new(
        handler: H,
        gtp_path: G,
        pfcp_path: P,
        receiver: mpsc::Receiver<SmfEvent>,
        policy_timeout: Duration,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            dispatcher: Dispatcher::new(handler),
            gtp_path,
            pfcp_path,
            receiver,
            timeout_queue: DelayQueue::new(),
            timer_keys: HashMap::new(),
            xact_keys: HashMap::new(),
            policy_timeout,
            transaction_timeout: policy_timeout,
        }
    }

    /// Deadline for transactions a handler leaves open. Defaults to the
    /// policy-answer timeout.
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn dispatcher(&self) -> &Dispatcher<H> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<H> {
        &mut self.dispatcher
    }

    /// Open the GTP-C path, then the PFCP path. A failure on either is
    /// fatal; whatever was already opened is closed again.
    pub async fn start(&mut self) -> Result<()> {
        if self.lifecycle.state() != LifecycleState::Initializing {
            return Err(SmfcError::InvalidStateTransition(format!(
                "Cannot start from state {:?}",
                self.lifecycle.state()
            )));
        }

        if let Err(e) = self.gtp_path.open().await {
            error!(error = %e, "Cannot open GTP-C path");
            self.abort_startup();
            return Err(e);
        }

        if let Err(e) = self.pfcp_path.open().await {
            error!(error = %e, "Cannot open PFCP path");
            self.gtp_path.close().await;
            self.abort_startup();
            return Err(e);
        }

        self.lifecycle.enter_operational()?;
        info!(
            gtpc = ?self.gtp_path.local_addr(),
            pfcp = ?self.pfcp_path.local_addr(),
            "SMF operational"
        );
        Ok(())
    }

    /// Close both paths. Further events are dropped.
    pub async fn stop(&mut self) {
        if self.lifecycle.state() == LifecycleState::ShuttingDown {
            return;
        }
        self.gtp_path.close().await;
        self.pfcp_path.close().await;
        if let Err(e) = self.lifecycle.shut_down() {
            warn!(error = %e, "Lifecycle transition failed");
        }
        info!(sessions = self.dispatcher.registry().len(), "SMF stopped");
    }

    pub async fn run(&mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                // 1. パスからのイベント受信
                Some(event) = self.receiver.recv() => {
                    self.handle_event(event);
                }

                // 2. タイムアウト発火
                Some(expired) = self.timeout_queue.next() => {
                    self.on_deadline(expired.into_inner());
                }

                else => break, // チャネルが閉じたら終了
            }
        }

        self.stop().await;
    }

    /// Run one event through the dispatcher. Outside Operational the
    /// event is dropped.
    pub fn handle_event(&mut self, event: SmfEvent) {
        let name = event.name();
        EVENTS_TOTAL.with_label_values(&[name]).inc();

        if !self.lifecycle.is_operational() {
            debug!(event = name, state = ?self.lifecycle.state(), "Dropping event");
            DISCARDS_TOTAL
                .with_label_values(&[DropReason::NotOperational.label()])
                .inc();
            return;
        }

        let timer = DISPATCH_LATENCY_SECONDS.start_timer();
        let actions = self.dispatcher.dispatch(event);
        timer.observe_duration();

        self.execute_actions(actions);
    }

    fn on_deadline(&mut self, deadline: Deadline) {
        let (teid, xact) = match deadline {
            Deadline::Policy { teid, xact } => {
                self.timer_keys.remove(&teid);
                POLICY_TIMEOUTS_TOTAL.inc();
                (teid, xact)
            }
            Deadline::Transaction { teid, xact } => {
                self.xact_keys.remove(&xact);
                (teid, xact)
            }
        };
        self.handle_event(SmfEvent::TransactionTimeout { teid, xact });
    }

    fn execute_actions(&mut self, actions: Vec<SmfAction>) {
        for action in actions {
            match action {
                SmfAction::SessionCreated(teid) => debug!(%teid, "Session created"),
                SmfAction::SessionReleased(teid) => debug!(%teid, "Session released"),
                SmfAction::ArmPolicyTimer { teid, xact } => {
                    let key = self
                        .timeout_queue
                        .insert(Deadline::Policy { teid, xact }, self.policy_timeout);
                    if let Some(stale) = self.timer_keys.insert(teid, key) {
                        self.timeout_queue.try_remove(&stale);
                    }
                }
                SmfAction::CancelPolicyTimer(teid) => {
                    if let Some(key) = self.timer_keys.remove(&teid) {
                        self.timeout_queue.try_remove(&key);
                    }
                }
                SmfAction::ArmTransactionTimer { teid, xact } => {
                    let key = self.timeout_queue.insert(
                        Deadline::Transaction { teid, xact },
                        self.transaction_timeout,
                    );
                    if let Some(stale) = self.xact_keys.insert(xact, key) {
                        self.timeout_queue.try_remove(&stale);
                    }
                }
                SmfAction::ContinuationReleased(teid) => {
                    debug!(%teid, "Parked request released")
                }
                SmfAction::Discard(reason) => {
                    if matches!(reason, DropReason::PolicyFailure { .. }) {
                        POLICY_FAILURES_TOTAL.inc();
                    }
                    DISCARDS_TOTAL.with_label_values(&[reason.label()]).inc();
                }
            }
        }

        SESSIONS_ACTIVE.set(self.dispatcher.registry().len() as i64);
        CONTINUATIONS_PENDING.set(self.dispatcher.continuations().len() as i64);
    }

    fn abort_startup(&mut self) {
        if let Err(e) = self.lifecycle.shut_down() {
            warn!(error = %e, "Lifecycle transition failed");
        }
    }
}
