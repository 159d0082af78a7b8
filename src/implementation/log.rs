// Copyright 2021 Michael Freitas Gustavo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides the central iteration log: the append-only history
//! of everything every worker ever reported, and the sole data source of the
//! hunter and checker predicates.
//!
//! The log is uniquely owned by the manager. Its single writer is the
//! manager's drain step; predicates read it through a shared reference on
//! the manager thread, so every evaluation sees a consistent snapshot of
//! each stream without any locking.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Bound, IterationResult, LogError, OptId, OptimizerMetadata};

/// One appended iteration together with the running aggregates the log
/// maintains for it. This is the row format of the persisted iteration
/// tables and the working set of every windowed kill condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Step counter within the worker.
    pub n_iter: u32,
    /// Cumulative objective evaluations over *all* workers at the moment
    /// this row arrived at the manager.
    pub f_call_overall: u64,
    /// Cumulative objective evaluations of this worker alone.
    pub f_call_opt: u64,
    /// The parameter vector tried.
    pub x: Vec<f64>,
    /// The objective value (`+inf` marks an invalid point).
    pub fx: f64,
    /// Running minimum of `fx` over the stream so far.
    pub fx_best: f64,
    /// The `n_iter` at which `fx_best` was attained, if any finite value was.
    pub i_best: Option<u32>,
    /// Arrival time in wall-clock seconds since the manager started.
    pub timestamp: f64,
    /// Optional detailed-call residuals.
    pub extras: Vec<f64>,
}

/// The numeric tracks which can be extracted from a stream with
/// [IterationLog::get_history].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Track {
    FCallOverall,
    FCallOpt,
    Fx,
    FxBest,
    IBest,
    NIter,
    Timestamp,
}

/// The globally best iteration seen so far, ties broken by earliest arrival.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestIteration {
    pub opt_id: OptId,
    pub n_iter: u32,
    pub x: Vec<f64>,
    pub fx: f64,
}

/// History, annotations and metadata of a single managed optimizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct OptimizerStream {
    metadata: OptimizerMetadata,
    extra_metadata: BTreeMap<String, String>,
    history: Vec<IterationRecord>,
    messages: Vec<String>,
    fx_best: f64,
    i_best: Option<u32>,
    f_call_opt: u64,
    finalized: bool,
}

impl OptimizerStream {
    fn new(metadata: OptimizerMetadata) -> Self {
        OptimizerStream {
            metadata,
            extra_metadata: BTreeMap::new(),
            history: vec![],
            messages: vec![],
            fx_best: f64::INFINITY,
            i_best: None,
            f_call_opt: 0,
            finalized: false,
        }
    }
}

/// The append-only per-optimizer history with best-point tracking, used by
/// the manager for bookkeeping and by every predicate as its query surface.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IterationLog {
    streams: BTreeMap<OptId, OptimizerStream>,
    best: Option<BestIteration>,
    f_call_overall: u64,
    total_iterations: usize,
    closed: bool,
}

impl IterationLog {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a new per-worker stream. Registering the same identity
    /// twice is a programming error and is rejected.
    pub fn add_optimizer(&mut self, opt_id: OptId, metadata: OptimizerMetadata) -> Result<(), LogError> {
        if self.streams.contains_key(&opt_id) {
            return Err(LogError::DuplicateOptimizer(opt_id));
        }
        self.streams.insert(opt_id, OptimizerStream::new(metadata));
        Ok(())
    }

    /// Appends one iteration to its stream and updates the running
    /// aggregates (`fx_best`, `i_best`, overall call counter, global best).
    ///
    /// Rejected without side effect when the stream is unknown, has already
    /// received its final packet, breaks the strict `n_iter` monotonicity,
    /// or the log has been closed.
    pub fn put_iteration(&mut self, result: IterationResult) -> Result<(), LogError> {
        if self.closed {
            return Err(LogError::Closed);
        }
        let stream = self
            .streams
            .get_mut(&result.opt_id)
            .ok_or(LogError::UnknownOptimizer(result.opt_id))?;
        if stream.finalized {
            return Err(LogError::AfterFinal(result.opt_id));
        }
        if let Some(last) = stream.history.last() {
            if result.n_iter <= last.n_iter {
                return Err(LogError::OutOfOrder {
                    opt_id: result.opt_id,
                    got: result.n_iter,
                    last: last.n_iter,
                });
            }
        }

        self.f_call_overall += u64::from(result.i_fcalls);
        self.total_iterations += 1;
        stream.f_call_opt += u64::from(result.i_fcalls);

        if result.fx < stream.fx_best {
            stream.fx_best = result.fx;
            stream.i_best = Some(result.n_iter);
        }
        // strict comparison implements the earliest-arrival tie break
        let global_improved = self.best.as_ref().map_or(result.fx < f64::INFINITY, |b| result.fx < b.fx);
        if global_improved {
            self.best = Some(BestIteration {
                opt_id: result.opt_id,
                n_iter: result.n_iter,
                x: result.x.clone(),
                fx: result.fx,
            });
        }

        stream.history.push(IterationRecord {
            n_iter: result.n_iter,
            f_call_overall: self.f_call_overall,
            f_call_opt: stream.f_call_opt,
            x: result.x,
            fx: result.fx,
            fx_best: stream.fx_best,
            i_best: stream.i_best,
            timestamp: result.timestamp,
            extras: result.extras,
        });
        if result.is_final {
            stream.finalized = true;
            stream.metadata.end_time = Some(result.timestamp);
        }
        Ok(())
    }

    /// Attaches a free-form key/value annotation to a stream.
    pub fn put_metadata(&mut self, opt_id: OptId, key: &str, value: &str) -> Result<(), LogError> {
        let stream = self.streams.get_mut(&opt_id).ok_or(LogError::UnknownOptimizer(opt_id))?;
        stream.extra_metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Appends a free-form message to a stream's message side channel.
    pub fn put_message(&mut self, opt_id: OptId, message: &str) -> Result<(), LogError> {
        let stream = self.streams.get_mut(&opt_id).ok_or(LogError::UnknownOptimizer(opt_id))?;
        stream.messages.push(message.to_string());
        Ok(())
    }

    /// Records the condition under which a worker ended and when.
    pub fn record_end(&mut self, opt_id: OptId, condition: &str, end_time: f64) -> Result<(), LogError> {
        let stream = self.streams.get_mut(&opt_id).ok_or(LogError::UnknownOptimizer(opt_id))?;
        stream.metadata.end_condition = Some(condition.to_string());
        stream.metadata.end_time.get_or_insert(end_time);
        Ok(())
    }

    /// The full record history of a stream, oldest first. Unknown streams
    /// yield an empty slice, which windowed predicates treat as
    /// "insufficient history".
    pub fn records(&self, opt_id: OptId) -> &[IterationRecord] {
        self.streams.get(&opt_id).map_or(&[], |s| s.history.as_slice())
    }

    /// One numeric track of a stream, oldest first. The `IBest` track maps
    /// records without a best iteration (nothing finite seen yet) to `-1`.
    pub fn get_history(&self, opt_id: OptId, track: Track) -> Vec<f64> {
        self.records(opt_id)
            .iter()
            .map(|r| match track {
                Track::FCallOverall => r.f_call_overall as f64,
                Track::FCallOpt => r.f_call_opt as f64,
                Track::Fx => r.fx,
                Track::FxBest => r.fx_best,
                Track::IBest => r.i_best.map_or(-1.0, f64::from),
                Track::NIter => f64::from(r.n_iter),
                Track::Timestamp => r.timestamp,
            })
            .collect()
    }

    /// The static metadata of a stream.
    pub fn metadata(&self, opt_id: OptId) -> Option<&OptimizerMetadata> {
        self.streams.get(&opt_id).map(|s| &s.metadata)
    }

    /// A free-form annotation previously stored with `put_metadata`.
    pub fn get_metadata(&self, opt_id: OptId, key: &str) -> Option<&str> {
        self.streams
            .get(&opt_id)
            .and_then(|s| s.extra_metadata.get(key))
            .map(String::as_str)
    }

    /// The message side channel of a stream.
    pub fn messages(&self, opt_id: OptId) -> &[String] {
        self.streams.get(&opt_id).map_or(&[], |s| s.messages.as_slice())
    }

    /// Identities of every registered stream, ascending.
    pub fn opt_ids(&self) -> impl Iterator<Item = OptId> + '_ {
        self.streams.keys().copied()
    }

    /// True iff the stream has received its final packet.
    pub fn is_finalized(&self, opt_id: OptId) -> bool {
        self.streams.get(&opt_id).is_some_and(|s| s.finalized)
    }

    /// Best objective value a stream has seen (`+inf` for empty streams).
    pub fn fx_best(&self, opt_id: OptId) -> f64 {
        self.streams.get(&opt_id).map_or(f64::INFINITY, |s| s.fx_best)
    }

    /// Cumulative objective evaluations of one stream.
    pub fn f_call_opt(&self, opt_id: OptId) -> u64 {
        self.streams.get(&opt_id).map_or(0, |s| s.f_call_opt)
    }

    /// Cumulative objective evaluations over all streams.
    pub fn f_call_overall(&self) -> u64 {
        self.f_call_overall
    }

    /// The globally best iteration appended so far.
    pub fn best_iter(&self) -> Option<&BestIteration> {
        self.best.as_ref()
    }

    /// Total number of iterations across all streams.
    pub fn len(&self) -> usize {
        self.total_iterations
    }
    pub fn is_empty(&self) -> bool {
        self.total_iterations == 0
    }

    /// Number of registered streams.
    pub fn n_optimizers(&self) -> usize {
        self.streams.len()
    }

    /// Marks the log closed. Further appends are rejected; closing again is
    /// a no-op.
    pub fn close(&mut self) {
        self.closed = true;
    }
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Writes one YAML file per stream into `dir`, named `NN_Type.yml`, with
    /// the `DETAILS` / `MESSAGES` / `ITERATION_HISTORY` layout.
    pub fn save_optimizers(&self, dir: &Path) -> Result<(), crate::GlompoError> {
        fs::create_dir_all(dir)?;
        let digits = self
            .streams
            .keys()
            .last()
            .map_or(1, |id| id.to_string().len());
        for (opt_id, stream) in &self.streams {
            let name = format!("{:0digits$}_{}.yml", opt_id.id(), stream.metadata.opt_type);
            let doc = OptimizerDump {
                details: details_map(opt_id, stream),
                messages: &stream.messages,
                iteration_history: stream.history.iter().map(|r| (r.n_iter, RecordDump::from(r))).collect(),
            };
            fs::write(dir.join(name), serde_yaml::to_string(&doc)?)?;
        }
        Ok(())
    }

    /// Writes the run summary: a YAML map from `opt_id` to the end condition
    /// and best point of that optimizer.
    pub fn save_summary(&self, path: &Path) -> Result<(), crate::GlompoError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let summary: BTreeMap<u32, SummaryEntry> = self
            .streams
            .iter()
            .map(|(opt_id, stream)| {
                let best = stream
                    .i_best
                    .and_then(|i| stream.history.iter().find(|r| r.n_iter == i));
                (
                    opt_id.id(),
                    SummaryEntry {
                        end_cond: stream.metadata.end_condition.clone(),
                        f_calls: stream.f_call_opt,
                        f_best: stream.fx_best,
                        x_best: best.map(|r| r.x.clone()),
                    },
                )
            })
            .collect();
        fs::write(path, serde_yaml::to_string(&summary)?)?;
        Ok(())
    }
}

/// Span of the whole search space, used by distance based kill conditions to
/// express tolerances as a fraction of the reachable diagonal.
pub fn bounds_diagonal(bounds: &[Bound]) -> f64 {
    bounds.iter().map(|b| b.span() * b.span()).sum::<f64>().sqrt()
}

// ----------------------------------------------------------------------------
// --- YAML layouts -----------------------------------------------------------
// ----------------------------------------------------------------------------

#[derive(Serialize)]
struct OptimizerDump<'a> {
    #[serde(rename = "DETAILS")]
    details: BTreeMap<String, serde_yaml::Value>,
    #[serde(rename = "MESSAGES")]
    messages: &'a [String],
    #[serde(rename = "ITERATION_HISTORY")]
    iteration_history: BTreeMap<u32, RecordDump>,
}

#[derive(Serialize)]
struct RecordDump {
    f_call_overall: u64,
    f_call_opt: u64,
    fx: f64,
    i_best: i64,
    fx_best: f64,
    x: Vec<f64>,
}
impl From<&IterationRecord> for RecordDump {
    fn from(r: &IterationRecord) -> Self {
        RecordDump {
            f_call_overall: r.f_call_overall,
            f_call_opt: r.f_call_opt,
            fx: r.fx,
            i_best: r.i_best.map_or(-1, i64::from),
            fx_best: r.fx_best,
            x: r.x.clone(),
        }
    }
}

#[derive(Serialize)]
struct SummaryEntry {
    end_cond: Option<String>,
    f_calls: u64,
    f_best: f64,
    x_best: Option<Vec<f64>>,
}

fn details_map(opt_id: &OptId, stream: &OptimizerStream) -> BTreeMap<String, serde_yaml::Value> {
    use serde_yaml::Value;
    let meta = &stream.metadata;
    let mut map = BTreeMap::new();
    map.insert("Optimizer ID".to_string(), Value::from(u64::from(opt_id.id())));
    map.insert("Optimizer Type".to_string(), Value::from(meta.opt_type.clone()));
    map.insert("Start Time".to_string(), Value::from(meta.start_time));
    if let Some(end) = meta.end_time {
        map.insert("End Time".to_string(), Value::from(end));
    }
    if let Some(cond) = &meta.end_condition {
        map.insert("End Condition".to_string(), Value::from(cond.clone()));
    }
    map.insert("Slots".to_string(), Value::from(meta.slots as u64));
    map.insert(
        "Starting Point".to_string(),
        Value::Sequence(meta.starting_point.iter().map(|v| Value::from(*v)).collect()),
    );
    for (k, v) in &stream.extra_metadata {
        map.insert(k.clone(), Value::from(v.clone()));
    }
    map
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_log {
    use crate::*;

    fn meta(opt_type: &str) -> OptimizerMetadata {
        OptimizerMetadata {
            opt_type: opt_type.to_string(),
            init_config: serde_json::Value::Null,
            start_time: 0.0,
            end_time: None,
            end_condition: None,
            slots: 1,
            starting_point: vec![0.0],
        }
    }

    fn iteration(opt_id: u32, n_iter: u32, fx: f64) -> IterationResult {
        IterationResult {
            opt_id: OptId(opt_id),
            n_iter,
            i_fcalls: 1,
            x: vec![fx],
            fx,
            is_final: false,
            timestamp: 0.0,
            extras: vec![],
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        assert_eq!(
            Err(LogError::DuplicateOptimizer(OptId(1))),
            log.add_optimizer(OptId(1), meta("A"))
        );
    }

    #[test]
    fn unknown_stream_is_rejected() {
        let mut log = IterationLog::new();
        assert_eq!(
            Err(LogError::UnknownOptimizer(OptId(9))),
            log.put_iteration(iteration(9, 1, 0.0))
        );
    }

    #[test]
    fn fx_best_is_monotonically_non_increasing() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        for (i, fx) in [5.0, 7.0, 3.0, 3.0, 9.0, 1.0].iter().enumerate() {
            log.put_iteration(iteration(1, i as u32 + 1, *fx)).unwrap();
        }
        let best = log.get_history(OptId(1), Track::FxBest);
        assert_eq!(vec![5.0, 5.0, 3.0, 3.0, 3.0, 1.0], best);
        assert!(best.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(vec![1.0, 1.0, 3.0, 3.0, 3.0, 6.0], log.get_history(OptId(1), Track::IBest));
    }

    #[test]
    fn global_best_ties_break_on_earliest_arrival() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        log.add_optimizer(OptId(2), meta("B")).unwrap();
        log.put_iteration(iteration(1, 1, 4.0)).unwrap();
        log.put_iteration(iteration(2, 1, 4.0)).unwrap();
        let best = log.best_iter().unwrap();
        assert_eq!(OptId(1), best.opt_id);
        assert_eq!(4.0, best.fx);

        log.put_iteration(iteration(2, 2, 2.0)).unwrap();
        assert_eq!(OptId(2), log.best_iter().unwrap().opt_id);
    }

    #[test]
    fn infinite_fx_never_becomes_the_global_best() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        log.put_iteration(iteration(1, 1, f64::INFINITY)).unwrap();
        assert!(log.best_iter().is_none());
        log.put_iteration(iteration(1, 2, 8.0)).unwrap();
        assert_eq!(8.0, log.best_iter().unwrap().fx);
    }

    #[test]
    fn out_of_order_iterations_are_rejected_and_dropped() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        log.put_iteration(iteration(1, 5, 1.0)).unwrap();
        assert_eq!(
            Err(LogError::OutOfOrder { opt_id: OptId(1), got: 3, last: 5 }),
            log.put_iteration(iteration(1, 3, 0.5))
        );
        // the stream retains only the in-order row
        assert_eq!(1, log.records(OptId(1)).len());
        assert_eq!(5, log.records(OptId(1))[0].n_iter);
        assert_eq!(1, log.f_call_overall());
    }

    #[test]
    fn appends_after_the_final_packet_are_rejected() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        let mut last = iteration(1, 1, 1.0);
        last.is_final = true;
        log.put_iteration(last).unwrap();
        assert!(log.is_finalized(OptId(1)));
        assert_eq!(
            Err(LogError::AfterFinal(OptId(1))),
            log.put_iteration(iteration(1, 2, 0.1))
        );
        assert_eq!(1, log.len());
    }

    #[test]
    fn close_is_idempotent_and_stops_appends() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        log.close();
        log.close();
        assert!(log.is_closed());
        assert_eq!(Err(LogError::Closed), log.put_iteration(iteration(1, 1, 1.0)));
    }

    #[test]
    fn call_counters_accumulate_per_stream_and_overall() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        log.add_optimizer(OptId(2), meta("B")).unwrap();
        let mut it = iteration(1, 1, 1.0);
        it.i_fcalls = 3;
        log.put_iteration(it).unwrap();
        log.put_iteration(iteration(2, 1, 2.0)).unwrap();
        log.put_iteration(iteration(1, 2, 0.5)).unwrap();

        assert_eq!(vec![3.0, 5.0], log.get_history(OptId(1), Track::FCallOverall));
        assert_eq!(vec![3.0, 5.0], log.get_history(OptId(1), Track::FCallOpt));
        assert_eq!(vec![4.0], log.get_history(OptId(2), Track::FCallOverall));
        assert_eq!(vec![1.0], log.get_history(OptId(2), Track::FCallOpt));
        assert_eq!(5, log.f_call_overall());
        assert_eq!(3, log.len());
    }

    #[test]
    fn messages_and_metadata_side_channels() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        log.put_message(OptId(1), "hello").unwrap();
        log.put_metadata(OptId(1), "note", "something").unwrap();
        assert_eq!(&["hello".to_string()], log.messages(OptId(1)));
        assert_eq!(Some("something"), log.get_metadata(OptId(1), "note"));
        assert!(log.put_message(OptId(9), "nope").is_err());
    }

    #[test]
    fn yaml_dump_round_trips_through_the_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("RandomSearch")).unwrap();
        log.put_iteration(iteration(1, 1, 3.5)).unwrap();
        log.record_end(OptId(1), "test over", 1.0).unwrap();

        log.save_optimizers(dir.path()).unwrap();
        let text = std::fs::read_to_string(dir.path().join("1_RandomSearch.yml")).unwrap();
        assert!(text.contains("DETAILS"));
        assert!(text.contains("MESSAGES"));
        assert!(text.contains("ITERATION_HISTORY"));
        assert!(text.contains("Optimizer Type: RandomSearch"));

        let summary = dir.path().join("summary.yml");
        log.save_summary(&summary).unwrap();
        let text = std::fs::read_to_string(summary).unwrap();
        assert!(text.contains("end_cond: test over"));
        assert!(text.contains("f_best: 3.5"));
    }

    #[test]
    fn serde_round_trip_preserves_contents() {
        let mut log = IterationLog::new();
        log.add_optimizer(OptId(1), meta("A")).unwrap();
        log.put_iteration(iteration(1, 1, 2.0)).unwrap();
        log.put_message(OptId(1), "m").unwrap();

        let json = serde_json::to_string(&log).unwrap();
        let back: IterationLog = serde_json::from_str(&json).unwrap();
        assert_eq!(log.records(OptId(1)), back.records(OptId(1)));
        assert_eq!(log.best_iter(), back.best_iter());
        assert_eq!(log.len(), back.len());
    }

    #[test]
    fn bounds_diagonal_is_the_span_norm() {
        let bounds = vec![Bound::new(0.0, 3.0), Bound::new(0.0, 4.0)];
        assert_eq!(5.0, bounds_diagonal(&bounds));
    }
}
