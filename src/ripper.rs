//! Pipeline façade
//!
//! Wires the stages into one streaming run: git reader -> history engine
//! -> decorator pool -> reorder forwarder -> caller's sink. Stages talk
//! over bounded channels, so the engine can never run ahead of a slow
//! consumer by more than the queue depth. The engine stays on a single
//! thread; decorators may finish out of order and the forwarder restores
//! commit order by sequence number.
//!
//! Cancellation is the consumer hanging up: dropping the sink's receiver
//! unwinds every stage, kills the git child, and surfaces `Cancelled`
//! unless a real error got there first.

use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Sender};
use tracing::{info, warn};

use crate::engine::checkpoint::{self, CheckpointStore};
use crate::engine::{Emission, EngineOpts, HistoryEngine};
use crate::error::{RipError, RipResult};
use crate::fileinfo::FileInfo;
use crate::git::commit_meta;
use crate::git::exec::{self, GitExec, HistoryMode};
use crate::git::parents_graph::ParentsGraph;
use crate::git::branches;
use crate::models::{BlameResult, CommitId};

/// Depth of every inter-stage queue; doubles as the reorder window after
/// the decorator pool.
const QUEUE_DEPTH: usize = 128;

#[derive(Debug, Clone, Default)]
pub struct RipOpts {
    /// Process every local branch instead of the first-parent chain of
    /// HEAD. Also enables branch attribution.
    pub all_branches: bool,
    /// Start emitting at this commit (inclusive). The engine still
    /// processes enough prior history to reconstruct trees.
    pub commit_from_incl: Option<CommitId>,
    /// Directory for resume checkpoints. None disables them.
    pub checkpoints_dir: Option<PathBuf>,
    /// Accept a checkpoint even when its last-processed commit does not
    /// match `commit_from_incl`.
    pub no_strict_resume: bool,
}

/// The single entry point over the whole pipeline.
#[derive(Debug, Default)]
pub struct Ripper;

impl Ripper {
    pub fn new() -> Self {
        Self
    }

    /// Streams every blame record of the selected history into `sink`, in
    /// commit-topological order. The sink is closed exactly once on
    /// return, successful or not.
    pub fn rip(&self, repo_dir: &Path, sink: Sender<BlameResult>, opts: &RipOpts) -> RipResult<()> {
        exec::prepare(repo_dir)?;
        let mode = if opts.all_branches {
            HistoryMode::AllBranches
        } else {
            HistoryMode::Head
        };
        let git = GitExec::new(repo_dir);

        let graph = Arc::new(ParentsGraph::build(
            git.rev_list(mode)?,
            git.graph_dump(mode)?,
        )?);
        info!(commits = graph.len(), "parents graph built");

        let branch_map = if opts.all_branches {
            let tips = git.branch_tips()?;
            branches::attribute(&graph, &tips)
        } else {
            Default::default()
        };

        let store = opts.checkpoints_dir.as_deref().map(CheckpointStore::new);
        let mut engine = HistoryEngine::new(
            Arc::clone(&graph),
            EngineOpts {
                commit_from_incl: opts.commit_from_incl.clone(),
                retain_frontier: store.is_some(),
            },
        );

        let mut resume_from: Option<CommitId> = None;
        if let Some(store) = &store {
            if let Some(state) = store.load() {
                let matched = opts.no_strict_resume
                    || opts.commit_from_incl.as_deref() == Some(state.last_commit.as_str());
                if matched && graph.contains(&state.last_commit) {
                    let (trees, last) = checkpoint::thaw(state);
                    info!(trees = trees.len(), last = %last, "resuming from checkpoint");
                    for (sha, tree) in trees {
                        engine.seed_tree(sha, tree);
                    }
                    resume_from = Some(last);
                } else {
                    info!("checkpoint present but not applicable, processing from scratch");
                }
            }
        }

        let records = git.log_with_patches(mode, resume_from.as_deref())?;

        let first_error: Arc<Mutex<Option<RipError>>> = Arc::new(Mutex::new(None));
        let cancelled = Arc::new(AtomicBool::new(false));

        let (rec_tx, rec_rx) = bounded::<exec::RawCommitRecord>(QUEUE_DEPTH);
        let (em_tx, em_rx) = bounded::<Emission>(QUEUE_DEPTH);
        let (dec_tx, dec_rx) = bounded::<(u64, BlameResult)>(QUEUE_DEPTH);

        let reader_error = Arc::clone(&first_error);
        let reader = thread::spawn(move || {
            for record in records {
                match record {
                    Ok(record) => {
                        if rec_tx.send(record).is_err() {
                            return; // downstream gone; guard reaps the child
                        }
                    }
                    Err(e) => {
                        record_first_error(&reader_error, e);
                        return;
                    }
                }
            }
        });

        let engine_error = Arc::clone(&first_error);
        let engine_thread = thread::spawn(move || {
            for record in rec_rx {
                let mut parsed = match commit_meta::parse_record(&record) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        record_first_error(&engine_error, e);
                        return None;
                    }
                };
                parsed.commit.branches = branch_map
                    .get(&parsed.commit.sha)
                    .cloned()
                    .unwrap_or_default();
                match engine.process(parsed) {
                    Ok(emissions) => {
                        for emission in emissions {
                            if em_tx.send(emission).is_err() {
                                return None;
                            }
                        }
                    }
                    Err(e) => {
                        record_first_error(&engine_error, e);
                        return None;
                    }
                }
            }
            Some(engine.finish())
        });

        let worker_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let fileinfo = Arc::new(FileInfo::new());
        let mut pool = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let rx = em_rx.clone();
            let tx = dec_tx.clone();
            let fileinfo = Arc::clone(&fileinfo);
            pool.push(thread::spawn(move || {
                for emission in rx {
                    let seq = emission.seq;
                    let result = fileinfo.decorate(&emission);
                    if tx.send((seq, result)).is_err() {
                        return;
                    }
                }
            }));
        }
        drop(em_rx);
        drop(dec_tx);

        let forwarder_cancelled = Arc::clone(&cancelled);
        let forwarder = thread::spawn(move || {
            let mut next = 0u64;
            let mut held: BinaryHeap<Pending> = BinaryHeap::new();
            for (seq, result) in dec_rx {
                held.push(Pending { seq, result });
                while held.peek().is_some_and(|p| p.seq == next) {
                    let pending = held.pop().expect("peeked entry pops");
                    if sink.send(pending.result).is_err() {
                        forwarder_cancelled.store(true, Ordering::SeqCst);
                        return;
                    }
                    next += 1;
                }
            }
            // Nothing else arrives; drain whatever is held in order.
            let mut rest = held.into_vec();
            rest.sort_by_key(|p| p.seq);
            for pending in rest {
                if sink.send(pending.result).is_err() {
                    forwarder_cancelled.store(true, Ordering::SeqCst);
                    return;
                }
            }
        });

        let _ = reader.join();
        let engine_out = engine_thread.join().unwrap_or_default();
        for worker in pool {
            let _ = worker.join();
        }
        let _ = forwarder.join();

        if let (Some(store), Some((trees, last_processed))) = (&store, engine_out) {
            let last = last_processed.or(resume_from);
            if let Some(last) = last {
                if let Err(e) = store.save(&checkpoint::freeze(&trees, last)) {
                    warn!(error = %e, "failed to write checkpoint");
                }
            }
        }

        if let Some(err) = first_error.lock().expect("error slot lock poisoned").take() {
            return Err(err);
        }
        if cancelled.load(Ordering::SeqCst) {
            return Err(RipError::Cancelled);
        }
        Ok(())
    }

    /// Convenience wrapper collecting all results into memory.
    pub fn rip_slice(&self, repo_dir: &Path, opts: &RipOpts) -> RipResult<Vec<BlameResult>> {
        let (tx, rx) = bounded(QUEUE_DEPTH);
        let collector = thread::spawn(move || rx.into_iter().collect::<Vec<BlameResult>>());
        let run = self.rip(repo_dir, tx, opts);
        let results = collector.join().expect("collector thread panicked");
        run.map(|()| results)
    }
}

fn record_first_error(slot: &Mutex<Option<RipError>>, err: RipError) {
    let mut slot = slot.lock().expect("error slot lock poisoned");
    if slot.is_none() {
        *slot = Some(err);
    }
}

/// Reordering entry; the heap is a min-heap on `seq`.
struct Pending {
    seq: u64,
    result: BlameResult,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.seq.cmp(&self.seq)
    }
}
