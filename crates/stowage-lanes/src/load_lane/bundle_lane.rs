// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{BundleTable, LoadCompletion, LoadError, LoadMode, LoadRequest, LoadTicket, PayloadLane};
use crossbeam_channel::{Receiver, Sender};
use stowage_core::asset::{AssetId, BundleName, BundleSource, Payload};
use stowage_core::manifest::BundleDependencyManifest;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

struct Job {
    ticket: LoadTicket,
    asset: AssetId,
    bundle: Option<BundleName>,
}

fn lock(table: &Mutex<BundleTable>) -> MutexGuard<'_, BundleTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires the owning bundle and reads one asset out of it.
///
/// On success the bundle stays acquired on behalf of the asset.
fn load_asset(
    table: &Mutex<BundleTable>,
    asset: &AssetId,
    bundle: Option<&BundleName>,
) -> Result<Payload, LoadError> {
    let bundle = bundle.ok_or_else(|| LoadError::NoBundle {
        asset: asset.clone(),
    })?;
    let archive = lock(table).acquire(bundle)?;

    let bytes = match archive.read(asset) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            lock(table).release(bundle);
            return Err(LoadError::NotInBundle {
                asset: asset.clone(),
                bundle: bundle.clone(),
            });
        }
        Err(e) => {
            lock(table).release(bundle);
            return Err(LoadError::Bundle {
                bundle: bundle.clone(),
                reason: e.to_string(),
            });
        }
    };
    Ok(Payload::new(bytes))
}

/// Loads payloads out of packed bundles.
///
/// Synchronous requests are served inline on the caller's thread.
/// Asynchronous requests go to a single background worker; their completions
/// come back over a channel and are handed out by [`poll`](PayloadLane::poll).
pub struct BundleLane {
    table: Arc<Mutex<BundleTable>>,
    next_ticket: u64,
    ready: VecDeque<LoadCompletion>,
    in_flight: HashSet<LoadTicket>,
    jobs: Option<Sender<Job>>,
    done: Receiver<LoadCompletion>,
    worker: Option<JoinHandle<()>>,
}

impl BundleLane {
    /// Creates the lane and starts its worker thread.
    pub fn new(
        source: Arc<dyn BundleSource>,
        manifest: Arc<BundleDependencyManifest>,
    ) -> io::Result<Self> {
        let table = Arc::new(Mutex::new(BundleTable::new(source, manifest)));
        let (jobs, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (done_tx, done) = crossbeam_channel::unbounded();

        let worker_table = Arc::clone(&table);
        let worker = thread::Builder::new()
            .name("stowage-bundle-loader".to_string())
            .spawn(move || {
                log::debug!("Bundle loader thread started.");
                for job in job_rx.iter() {
                    let result = load_asset(&worker_table, &job.asset, job.bundle.as_ref());
                    let completion = LoadCompletion {
                        ticket: job.ticket,
                        result,
                    };
                    if done_tx.send(completion).is_err() {
                        break;
                    }
                }
                log::debug!("Bundle loader thread stopped.");
            })?;

        Ok(Self {
            table,
            next_ticket: 1,
            ready: VecDeque::new(),
            in_flight: HashSet::new(),
            jobs: Some(jobs),
            done,
            worker: Some(worker),
        })
    }

    /// Number of bundles currently open.
    pub fn open_bundles(&self) -> usize {
        lock(&self.table).open_count()
    }

    /// Returns `true` if `bundle` is currently open.
    pub fn is_bundle_open(&self, bundle: &BundleName) -> bool {
        lock(&self.table).is_open(bundle)
    }

    fn receive(&mut self, completion: LoadCompletion) {
        self.in_flight.remove(&completion.ticket);
        self.ready.push_back(completion);
    }
}

impl PayloadLane for BundleLane {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn begin(&mut self, request: LoadRequest) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;

        match request.mode {
            LoadMode::Sync => {
                let result = load_asset(&self.table, &request.asset, request.bundle.as_ref());
                self.ready.push_back(LoadCompletion { ticket, result });
            }
            LoadMode::Async => {
                let job = Job {
                    ticket,
                    asset: request.asset,
                    bundle: request.bundle,
                };
                let sent = self.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
                if sent {
                    self.in_flight.insert(ticket);
                } else {
                    log::warn!("Bundle loader thread is gone; failing load {ticket}.");
                    self.ready.push_back(LoadCompletion {
                        ticket,
                        result: Err(LoadError::Disconnected),
                    });
                }
            }
        }
        ticket
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        while let Ok(completion) = self.done.try_recv() {
            self.receive(completion);
        }
        self.ready.drain(..).collect()
    }

    fn wait(&mut self, ticket: LoadTicket) -> LoadCompletion {
        if let Some(index) = self.ready.iter().position(|c| c.ticket == ticket) {
            if let Some(completion) = self.ready.remove(index) {
                return completion;
            }
        }
        if !self.in_flight.contains(&ticket) {
            return LoadCompletion {
                ticket,
                result: Err(LoadError::UnknownTicket(ticket.0)),
            };
        }

        loop {
            match self.done.recv() {
                Ok(completion) if completion.ticket == ticket => {
                    self.in_flight.remove(&ticket);
                    return completion;
                }
                Ok(other) => self.receive(other),
                Err(_) => {
                    self.in_flight.remove(&ticket);
                    return LoadCompletion {
                        ticket,
                        result: Err(LoadError::Disconnected),
                    };
                }
            }
        }
    }

    fn unload(&mut self, _asset: &AssetId, bundle: Option<&BundleName>) {
        if let Some(bundle) = bundle {
            lock(&self.table).release(bundle);
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight.len() + self.ready.len()
    }

    fn shutdown(&mut self) {
        lock(&self.table).release_all();
    }
}

impl Drop for BundleLane {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Bundle loader thread panicked.");
            }
        }
    }
}
