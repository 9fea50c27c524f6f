// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory stand-in for the state subprocess, used by tests.

use crate::protocol::{encode_frame, read_frame, StateOp, StateRequest, StateResponse};
use joblet_core::{Job, JobId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

#[derive(Default)]
struct ServerState {
    jobs: HashMap<JobId, Job>,
    seen_requests: HashSet<String>,
    request_count: u64,
}

/// Listens on a unix socket and answers the NDJSON state protocol from an
/// in-memory map. Mutations are idempotent by request ID, like the real
/// subprocess.
pub struct TestStateServer {
    pub socket_path: PathBuf,
    state: Arc<Mutex<ServerState>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestStateServer {
    pub async fn start(socket_path: PathBuf) -> std::io::Result<Self> {
        let listener = UnixListener::bind(&socket_path)?;
        let state = Arc::new(Mutex::new(ServerState::default()));

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let conn_state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut reader = BufReader::new(read_half);
                    loop {
                        let request: StateRequest = match read_frame(&mut reader).await {
                            Ok(request) => request,
                            Err(_) => break,
                        };
                        let response = handle_request(&conn_state, request);
                        let Ok(frame) = encode_frame(&response) else {
                            break;
                        };
                        if write_half.write_all(&frame).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Ok(Self {
            socket_path,
            state,
            handle,
        })
    }

    pub fn job(&self, id: &JobId) -> Option<Job> {
        self.state.lock().jobs.get(id).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn request_count(&self) -> u64 {
        self.state.lock().request_count
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for TestStateServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn handle_request(state: &Mutex<ServerState>, request: StateRequest) -> StateResponse {
    let mut state = state.lock();
    state.request_count += 1;

    let mut response = StateResponse {
        request_id: request.request_id.clone(),
        success: true,
        job: None,
        jobs: None,
        error: None,
    };

    let mutation = matches!(
        request.op,
        StateOp::Create | StateOp::Update | StateOp::Delete | StateOp::Sync
    );
    if mutation && !state.seen_requests.insert(request.request_id.clone()) {
        // Replay of an already-applied request.
        return response;
    }

    match request.op {
        StateOp::Create | StateOp::Update => match request.job {
            Some(job) => {
                state.jobs.insert(job.id.clone(), job);
            }
            None => {
                response.success = false;
                response.error = Some("missing job".to_string());
            }
        },
        StateOp::Sync => {
            for job in request.jobs.unwrap_or_default() {
                state.jobs.insert(job.id.clone(), job);
            }
        }
        StateOp::Delete => match request.job_id {
            Some(job_id) => {
                state.jobs.remove(&job_id);
            }
            None => {
                response.success = false;
                response.error = Some("missing jobId".to_string());
            }
        },
        StateOp::Get => {
            response.job = request
                .job_id
                .and_then(|job_id| state.jobs.get(&job_id).cloned());
        }
        StateOp::List => {
            let filter = request.filter.unwrap_or_default();
            let mut jobs: Vec<Job> = state
                .jobs
                .values()
                .filter(|job| {
                    filter.status.map_or(true, |status| job.status == status)
                        && filter.workflow_id.as_ref().map_or(true, |wf| {
                            job.spec.workflow_id.as_ref() == Some(wf)
                        })
                })
                .cloned()
                .collect();
            jobs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
            response.jobs = Some(jobs);
        }
        StateOp::Ping => {}
    }

    response
}
