//! Fire-and-forget lifecycle operations.
//!
//! Each call spawns a detached task and returns at once. Whatever cbsd does
//! afterwards is only visible in the gateway's log and, eventually, in the
//! next inventory listing; it is never reported back to the caller.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::descriptor::CreateDescriptor;
use crate::tool::{Cbsd, Invocation, Lifecycle, ToolRunner};

#[derive(Clone)]
pub struct Dispatcher {
    runner: Arc<dyn ToolRunner>,
    cbsd: Cbsd,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn ToolRunner>, cbsd: Cbsd) -> Self {
        Self { runner, cbsd }
    }

    pub fn start(&self, name: &str) -> JoinHandle<()> {
        self.lifecycle(Lifecycle::Start, name)
    }

    pub fn stop(&self, name: &str) -> JoinHandle<()> {
        self.lifecycle(Lifecycle::Stop, name)
    }

    pub fn remove(&self, name: &str) -> JoinHandle<()> {
        self.lifecycle(Lifecycle::Remove, name)
    }

    /// Output is captured and dropped; only the outcome is logged.
    fn lifecycle(&self, op: Lifecycle, name: &str) -> JoinHandle<()> {
        let invocation = self.cbsd.lifecycle(op, name);
        let runner = self.runner.clone();
        let vm = name.to_string();

        tokio::spawn(async move {
            match runner.capture(&invocation).await {
                Ok(_) => tracing::info!(%vm, op = %op, "lifecycle command finished"),
                Err(e) => tracing::warn!(%vm, op = %op, "lifecycle command failed: {e}"),
            }
        })
    }

    /// Runs `bcreate` attached to the gateway's own stdio so prompts and
    /// progress from cbsd show up on its console.
    pub fn create(&self, descriptor: &CreateDescriptor) -> JoinHandle<()> {
        let invocation = self.cbsd.create(descriptor);
        tracing::info!(vm = %descriptor.jname, command = %invocation, "bcreate");
        self.spawn_attached(invocation)
    }

    fn spawn_attached(&self, invocation: Invocation) -> JoinHandle<()> {
        let runner = self.runner.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.attached(&invocation).await {
                tracing::error!(command = %invocation, "bcreate failed: {e}");
            }
        })
    }
}
