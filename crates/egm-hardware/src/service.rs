//! Single-writer device service.
//!
//! A [`DeviceService`] owns one [`DeviceAdapter`] on a dedicated task and is
//! its only writer. Three inputs are multiplexed onto that task:
//!
//! ```text
//! ┌────────────────┐
//! │ Implementation │──events──►┌──────────────────┐
//! └────────────────┘           │                  │──snapshot (watch)──► readers
//! ┌────────────────┐           │  DeviceService   │
//! │ ServiceHandle  │─commands─►│  (adapter owner) │──domain events────► EventBus
//! └────────────────┘           │                  │
//! ┌────────────────┐           │                  │
//! │ spawned work   │─outcomes─►└──────────────────┘
//! └────────────────┘
//! ```
//!
//! Long operations (inspection requests, device initialization,
//! submissions) run on spawned tasks, so the owner keeps draining the event
//! channel the implementation answers on. Their outcomes come back tagged with the adapter's disconnect
//! epoch; an outcome from before the latest disconnect is dropped.
//!
//! Device-specific behavior plugs in through the [`Pipeline`] strategy.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use egm_core::{DisableReason, EnableReason, Error, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter::{DeviceAdapter, DeviceSnapshot, EventFollowup};
use crate::events::ImplementationEvent;
use crate::state_machine::LogicalState;
use crate::traits::{DeviceImplementation, EventReceiver};

/// Snapshot type published by a service over `I`.
pub type Snapshot<I> =
    DeviceSnapshot<<I as DeviceImplementation>::Fault, <I as DeviceImplementation>::Warning>;

/// Device-specific strategy run by a [`DeviceService`].
pub trait Pipeline<I: DeviceImplementation>: Send + 'static {
    /// Commands accepted beyond the common enable/disable set. Each command
    /// carries its own reply channel.
    type Command: Send + 'static;

    /// Result of work spawned through [`ServiceContext::spawn`].
    type Outcome: Send + 'static;

    /// Device-specific initialization, run while `Initializing`.
    /// Resolves to whether the device is ready.
    fn initialization(&mut self, implementation: Arc<I>) -> BoxFuture<'static, bool>;

    fn handle_command(
        &mut self,
        cx: &mut ServiceContext<'_, I, Self::Outcome>,
        command: Self::Command,
    ) -> impl Future<Output = ()> + Send;

    /// Called for outcomes from the current epoch only.
    fn handle_outcome(
        &mut self,
        cx: &mut ServiceContext<'_, I, Self::Outcome>,
        outcome: Self::Outcome,
    ) -> impl Future<Output = ()> + Send;

    /// Called after every state change (re-entries excluded).
    fn state_entered(
        &mut self,
        _cx: &mut ServiceContext<'_, I, Self::Outcome>,
        _state: LogicalState,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// The device disconnected; outstanding work will never report back.
    fn disconnected(&mut self) {}

    /// A new render target was persisted.
    fn render_target_changed(&mut self, _target: &str) {}
}

/// Pipeline for devices without device-specific commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicPipeline;

impl<I: DeviceImplementation> Pipeline<I> for BasicPipeline {
    type Command = Infallible;
    type Outcome = Infallible;

    fn initialization(&mut self, _implementation: Arc<I>) -> BoxFuture<'static, bool> {
        async { true }.boxed()
    }

    async fn handle_command(&mut self, _cx: &mut ServiceContext<'_, I, Infallible>, command: Infallible) {
        match command {}
    }

    async fn handle_outcome(&mut self, _cx: &mut ServiceContext<'_, I, Infallible>, outcome: Infallible) {
        match outcome {}
    }
}

/// Work result tagged with the epoch it was started in.
struct Tagged<O> {
    epoch: u64,
    outcome: Outcome<O>,
}

enum Outcome<O> {
    /// Whether the implementation accepted the inspection request.
    Inspection(bool),
    Initialization(bool),
    Pipeline(O),
}

/// Mutable access to the adapter for pipeline callbacks.
pub struct ServiceContext<'a, I: DeviceImplementation, O> {
    pub device: &'a mut DeviceAdapter<I>,
    outcomes: &'a mpsc::Sender<Tagged<O>>,
    snapshots: &'a watch::Sender<Snapshot<I>>,
}

impl<I: DeviceImplementation, O: Send + 'static> ServiceContext<'_, I, O> {
    /// Run `work` on its own task; its result comes back through
    /// [`Pipeline::handle_outcome`] unless the device disconnects first.
    ///
    /// The snapshot is published before spawning so `work` observes the
    /// state it was started in.
    pub fn spawn<Fut>(&mut self, work: Fut)
    where
        Fut: Future<Output = O> + Send + 'static,
    {
        self.snapshots.send_replace(self.device.snapshot());
        let epoch = self.device.epoch();
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let outcome = Outcome::Pipeline(work.await);
            // Service gone: nothing left to report to
            let _ = outcomes.send(Tagged { epoch, outcome }).await;
        });
    }

    /// Live view of the device state for spawned work.
    pub fn snapshots(&self) -> watch::Receiver<Snapshot<I>> {
        self.snapshots.subscribe()
    }

    /// Publish the current snapshot, then answer a command.
    ///
    /// A caller reading the snapshot after its reply sees the effect of
    /// its command.
    pub fn reply<R>(&self, reply: oneshot::Sender<R>, value: R) {
        self.snapshots.send_replace(self.device.snapshot());
        // Caller gave up waiting
        let _ = reply.send(value);
    }
}

/// Commands common to every device, plus the pipeline's own.
#[derive(Debug)]
pub enum Command<C> {
    Enable(EnableReason, oneshot::Sender<()>),
    Disable(DisableReason, oneshot::Sender<()>),
    Inspect(oneshot::Sender<bool>),
    SetRenderTarget(String, oneshot::Sender<Result<()>>),
    Pipeline(C),
}

/// Owner task of one adapter.
pub struct DeviceService<I: DeviceImplementation, P: Pipeline<I>> {
    device: DeviceAdapter<I>,
    pipeline: P,
    events: EventReceiver<I::Fault, I::Warning>,
    commands: mpsc::Receiver<Command<P::Command>>,
    outcomes_tx: mpsc::Sender<Tagged<P::Outcome>>,
    outcomes_rx: mpsc::Receiver<Tagged<P::Outcome>>,
    snapshots: watch::Sender<Snapshot<I>>,
}

impl<I: DeviceImplementation, P: Pipeline<I>> DeviceService<I, P> {
    /// Spawn the service task and start inspection.
    pub fn spawn(
        device: DeviceAdapter<I>,
        events: EventReceiver<I::Fault, I::Warning>,
        pipeline: P,
        command_capacity: usize,
    ) -> ServiceHandle<I, P::Command> {
        let (commands_tx, commands) = mpsc::channel(command_capacity);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(command_capacity);
        let (snapshots, snapshot_rx) = watch::channel(device.snapshot());

        let service = Self {
            device,
            pipeline,
            events,
            commands,
            outcomes_tx,
            outcomes_rx,
            snapshots,
        };
        let task = tokio::spawn(service.run());

        ServiceHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            task,
        }
    }

    async fn run(mut self) {
        let identity = self.device.identity();
        info!("Device service for {} started", identity);

        if self.device.inspect() {
            self.start_inspection();
        }
        self.settle().await;

        let mut events_open = true;
        loop {
            tokio::select! {
                biased;

                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        warn!("Event channel of {} closed", identity);
                        events_open = false;
                        self.handle_event(ImplementationEvent::Disconnected).await;
                    }
                },

                Some(tagged) = self.outcomes_rx.recv() => self.handle_outcome(tagged).await,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
            self.settle().await;
        }

        info!("Device service for {} stopped", identity);
    }

    fn context(&mut self) -> (&mut P, ServiceContext<'_, I, P::Outcome>) {
        (
            &mut self.pipeline,
            ServiceContext {
                device: &mut self.device,
                outcomes: &self.outcomes_tx,
                snapshots: &self.snapshots,
            },
        )
    }

    /// Run `work` on its own task, tagged with the current epoch.
    fn spawn_tagged<Fut>(&self, work: Fut)
    where
        Fut: Future<Output = Outcome<P::Outcome>> + Send + 'static,
    {
        let epoch = self.device.epoch();
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = work.await;
            // Service gone: nothing left to report to
            let _ = outcomes.send(Tagged { epoch, outcome }).await;
        });
    }

    fn start_inspection(&self) {
        let implementation = self.device.implementation().clone();
        let identity = self.device.identity();
        self.spawn_tagged(async move {
            match implementation.initialize().await {
                Ok(()) => Outcome::Inspection(true),
                Err(e) => {
                    error!("Inspection of {} could not start: {}", identity, e);
                    Outcome::Inspection(false)
                }
            }
        });
    }

    async fn handle_event(&mut self, event: ImplementationEvent<I::Fault, I::Warning>) {
        match self.device.handle_event(event).await {
            EventFollowup::None => {}
            EventFollowup::Inspect => self.start_inspection(),
            EventFollowup::Initialize => {
                let work = self.pipeline.initialization(self.device.implementation().clone());
                self.spawn_tagged(async move { Outcome::Initialization(work.await) });
            }
            EventFollowup::Disconnected => self.pipeline.disconnected(),
        }
    }

    async fn handle_outcome(&mut self, tagged: Tagged<P::Outcome>) {
        if tagged.epoch != self.device.epoch() {
            debug!(
                "Dropping stale outcome for {} (epoch {}, now {})",
                self.device.identity(),
                tagged.epoch,
                self.device.epoch()
            );
            return;
        }
        match tagged.outcome {
            Outcome::Inspection(true) => {}
            Outcome::Inspection(false) => self.device.inspection_failed(),
            Outcome::Initialization(ready) => self.device.complete_initialization(ready).await,
            Outcome::Pipeline(outcome) => {
                let (pipeline, mut cx) = self.context();
                pipeline.handle_outcome(&mut cx, outcome).await;
            }
        }
    }

    async fn handle_command(&mut self, command: Command<P::Command>) {
        match command {
            Command::Enable(reason, reply) => {
                self.device.enable(reason).await;
                self.reply(reply, ());
            }
            Command::Disable(reason, reply) => {
                self.device.disable(reason).await;
                self.reply(reply, ());
            }
            Command::Inspect(reply) => {
                let started = self.device.inspect();
                if started {
                    self.start_inspection();
                }
                self.reply(reply, started);
            }
            Command::SetRenderTarget(target, reply) => {
                let result = self.device.set_render_target(&target).await;
                if result.is_ok() {
                    self.pipeline.render_target_changed(&target);
                }
                self.reply(reply, result);
            }
            Command::Pipeline(command) => {
                let (pipeline, mut cx) = self.context();
                pipeline.handle_command(&mut cx, command).await;
            }
        }
    }

    fn reply<R>(&self, reply: oneshot::Sender<R>, value: R) {
        self.snapshots.send_replace(self.device.snapshot());
        let _ = reply.send(value);
    }

    /// Let the pipeline react to every state entered, then publish.
    async fn settle(&mut self) {
        loop {
            let transitions = self.device.drain_transitions();
            if transitions.is_empty() {
                break;
            }
            for transition in transitions.into_iter().filter(|t| !t.is_reentry()) {
                let (pipeline, mut cx) = self.context();
                pipeline.state_entered(&mut cx, transition.to).await;
            }
        }
        self.snapshots.send_replace(self.device.snapshot());
    }
}

/// Client side of a running [`DeviceService`].
pub struct ServiceHandle<I: DeviceImplementation, C> {
    commands: mpsc::Sender<Command<C>>,
    snapshot: watch::Receiver<Snapshot<I>>,
    task: JoinHandle<()>,
}

impl<I: DeviceImplementation, C: Send + 'static> ServiceHandle<I, C> {
    /// Latest published snapshot. Never blocks.
    pub fn snapshot(&self) -> Snapshot<I> {
        (*self.snapshot.borrow()).clone()
    }

    pub fn state(&self) -> LogicalState {
        self.snapshot.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<I>> {
        self.snapshot.clone()
    }

    /// Wait until the device reaches `state`.
    pub async fn wait_for_state(&self, state: LogicalState) -> Result<Snapshot<I>> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|snapshot| snapshot.state == state)
            .await
            .map_err(|_| Error::ServiceStopped)?;
        Ok((*snapshot).clone())
    }

    /// Send a command built around a fresh reply channel and await the reply.
    pub async fn request<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command<C>) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::ServiceStopped)?;
        response.await.map_err(|_| Error::ServiceStopped)
    }

    pub async fn enable(&self, reason: EnableReason) -> Result<()> {
        self.request(|reply| Command::Enable(reason, reply)).await
    }

    pub async fn disable(&self, reason: DisableReason) -> Result<()> {
        self.request(|reply| Command::Disable(reason, reply)).await
    }

    /// Restart inspection after a failed one. Returns whether it started.
    pub async fn inspect(&self) -> Result<bool> {
        self.request(Command::Inspect).await
    }

    pub async fn set_render_target(&self, target: impl Into<String>) -> Result<()> {
        let target = target.into();
        self.request(|reply| Command::SetRenderTarget(target, reply))
            .await?
    }

    /// Stop the service and wait for its task to finish.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.commands);
        self.task
            .await
            .map_err(|e| Error::Hardware(format!("device service task failed: {}", e)))
    }
}
