//! Test doubles for the compute provider, chat output and activity sink.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::activity::ActivitySink;
use super::dispatcher::OutputSink;
use super::format::Output;
use crate::compute::provider::Result;
use crate::compute::{ComputeClient, ComputeError, Server};

/// Shared, ordered record of what happened across fakes.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// In-memory compute provider. Server `i` gets id `id-i`.
pub struct FakeCompute {
    servers: Vec<Server>,
    calls: Mutex<Vec<String>>,
    list_calls: Mutex<usize>,
    fail_next: Mutex<Option<ComputeError>>,
    fail_list: Mutex<Option<ComputeError>>,
    journal: Option<Journal>,
}

impl FakeCompute {
    pub fn with_names(names: &[&str]) -> Self {
        let servers = names
            .iter()
            .enumerate()
            .map(|(i, name)| Server {
                id: format!("id-{}", i),
                name: name.to_string(),
                status: "ACTIVE".to_string(),
                addresses: BTreeMap::new(),
            })
            .collect();
        Self {
            servers,
            calls: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
            fail_next: Mutex::new(None),
            fail_list: Mutex::new(None),
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn snapshot(&self) -> Vec<Server> {
        self.servers.clone()
    }

    /// Mutating calls made so far, as `action:id`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    /// Make the next mutating call fail with `err`.
    pub fn fail_next(&self, err: ComputeError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    /// Make the next listing fail with `err`.
    pub fn fail_list(&self, err: ComputeError) {
        *self.fail_list.lock().unwrap() = Some(err);
    }

    fn record(&self, action: &str, server: &Server) -> Result<()> {
        let entry = format!("{}:{}", action, server.id);
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(format!("call {}", entry));
        }
        self.calls.lock().unwrap().push(entry);
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ComputeClient for FakeCompute {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        *self.list_calls.lock().unwrap() += 1;
        match self.fail_list.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(self.servers.clone()),
        }
    }

    async fn start_server(&self, server: &Server) -> Result<()> {
        self.record("start", server)
    }

    async fn stop_server(&self, server: &Server) -> Result<()> {
        self.record("stop", server)
    }

    async fn reboot_server(&self, server: &Server) -> Result<()> {
        self.record("reboot", server)
    }

    async fn destroy_server(&self, server: &Server) -> Result<()> {
        self.record("destroy", server)
    }
}

/// Collects everything the bot says.
#[derive(Default)]
pub struct RecordingSink {
    outputs: Mutex<Vec<Output>>,
    journal: Option<Journal>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            outputs: Mutex::new(Vec::new()),
            journal: Some(journal),
        }
    }

    pub fn outputs(&self) -> Vec<Output> {
        self.outputs.lock().unwrap().clone()
    }

    /// Plain messages only, in order.
    pub fn messages(&self) -> Vec<String> {
        self.outputs()
            .iter()
            .filter_map(|o| o.as_message().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl OutputSink for RecordingSink {
    async fn send(&self, output: Output) -> crate::error::Result<()> {
        if let Some(journal) = &self.journal {
            journal
                .lock()
                .unwrap()
                .push(format!("say {}", output.to_plain_text()));
        }
        self.outputs.lock().unwrap().push(output);
        Ok(())
    }
}

/// Collects activity ids.
#[derive(Default)]
pub struct RecordingActivity {
    ids: Mutex<Vec<String>>,
}

impl RecordingActivity {
    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivitySink for RecordingActivity {
    async fn emit(&self, activity_id: &str) {
        self.ids.lock().unwrap().push(activity_id.to_string());
    }
}
