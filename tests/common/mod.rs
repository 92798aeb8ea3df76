//! Shared fixtures for the commkit integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use commkit::coll::{GatherAlgorithms, GatherArgs, Request, RequestKind, Schedule};
use commkit::config::{CollOptions, OffloadConfig};
use commkit::context::{RuntimeContext, Services};
use commkit::core::types::ProcessGroup;
use commkit::error::Result;
use commkit::transport::LocalTransport;
use commkit::comm::Communicator;

/// Algorithm bodies that record which one ran; schedule builders add one barrier step.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn hit(&self, name: impl Into<String>) {
        self.calls.lock().unwrap().push(name.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl GatherAlgorithms for Recorder {
    fn intra_gentran_tree(&self, _: &GatherArgs, _: &Communicator, k: usize) -> Result<Request> {
        self.hit(format!("tree(k={k})"));
        Ok(Request::new(1000, RequestKind::Native))
    }

    fn intra_sched_binomial(&self, _: &GatherArgs, _: &Communicator, s: &mut Schedule) -> Result<()> {
        self.hit("binomial");
        s.barrier();
        Ok(())
    }

    fn inter_sched_short(&self, _: &GatherArgs, _: &Communicator, s: &mut Schedule) -> Result<()> {
        self.hit("short");
        s.barrier();
        Ok(())
    }

    fn inter_sched_long(&self, _: &GatherArgs, _: &Communicator, s: &mut Schedule) -> Result<()> {
        self.hit("long");
        s.barrier();
        Ok(())
    }

    fn device_igather(&self, _: &GatherArgs, _: &Communicator) -> Result<Request> {
        self.hit("device");
        Ok(Request::new(2000, RequestKind::Device))
    }
}

pub struct Fixture {
    pub ctx: RuntimeContext,
    pub transport: Arc<LocalTransport>,
    pub algorithms: Arc<Recorder>,
}

/// Runtime of `size` processes in which this process has rank 0.
pub fn runtime(size: usize) -> Fixture {
    runtime_with(size, CollOptions::default())
}

pub fn runtime_with(size: usize, options: CollOptions) -> Fixture {
    try_runtime_with(size, options).expect("runtime init")
}

pub fn try_runtime_with(size: usize, options: CollOptions) -> Result<Fixture> {
    let transport = Arc::new(LocalTransport::new());
    let algorithms = Arc::new(Recorder::default());
    let services = Services { transport: transport.clone(), progress: transport.clone(), algorithms: algorithms.clone() };
    let ctx = RuntimeContext::init(ProcessGroup::new(0, size), services, options, OffloadConfig::default())?;
    Ok(Fixture { ctx, transport, algorithms })
}
