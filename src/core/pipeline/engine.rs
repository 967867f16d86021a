//! Stage-by-stage execution over a shrinking working set.

use crate::core::item::{Item, WorkingSet};
use crate::core::report::{PipelineReport, StageReport};
use crate::core::stage::{Decision, Stage};
use crate::error::{CurateError, StageError};
use crate::events::{
    Event, EventSender, PipelineEvent, PipelineSummary, StageEvent, StageProgress, StageSummary,
};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Reason recorded for drops that carry none
const UNSPECIFIED_REASON: &str = "unspecified";

/// Engine settings
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Run each stage's decide phase on the rayon pool
    pub parallel: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Where the engine is in its single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running { stage_index: usize },
    Completed,
    Aborted { stage: Option<String>, reason: String },
}

impl RunState {
    fn label(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not started",
            RunState::Running { .. } => "running",
            RunState::Completed => "completed",
            RunState::Aborted { .. } => "aborted",
        }
    }
}

/// Output of a completed run
#[derive(Debug)]
pub struct PipelineRun {
    pub survivors: WorkingSet,
    pub report: PipelineReport,
}

/// Runs stages strictly in order, each one seeing only the survivors of
/// the previous one.
#[derive(Debug)]
pub struct PipelineEngine {
    options: EngineOptions,
    state: RunState,
}

impl PipelineEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Run every stage over `items`.
    ///
    /// On a fatal error the partial report is discarded and only the error
    /// (naming the stage where there is one) reaches the caller. An engine
    /// runs once; `Completed` and `Aborted` are final.
    pub fn run(
        &mut self,
        items: Vec<Item>,
        stages: &mut [Box<dyn Stage>],
        events: &EventSender,
    ) -> Result<PipelineRun, CurateError> {
        if self.state != RunState::NotStarted {
            return Err(CurateError::EngineReused {
                state: self.state.label(),
            });
        }

        events.send(Event::Pipeline(PipelineEvent::Started {
            stage_count: stages.len(),
        }));

        match self.run_stages(items, stages, events) {
            Ok(run) => {
                self.state = RunState::Completed;
                events.send(Event::Pipeline(PipelineEvent::Completed {
                    summary: PipelineSummary {
                        initial_count: run.report.initial_count,
                        final_count: run.report.final_count,
                        duration_ms: run.report.duration_ms(),
                    },
                }));
                Ok(run)
            }
            Err(error) => {
                let stage = error.stage_name().map(str::to_string);
                tracing::error!(stage = stage.as_deref().unwrap_or("-"), error = %error, "run aborted");
                self.state = RunState::Aborted {
                    stage: stage.clone(),
                    reason: error.to_string(),
                };
                events.send(Event::Pipeline(PipelineEvent::Aborted {
                    stage,
                    message: error.to_string(),
                }));
                Err(error)
            }
        }
    }

    fn run_stages(
        &mut self,
        items: Vec<Item>,
        stages: &mut [Box<dyn Stage>],
        events: &EventSender,
    ) -> Result<PipelineRun, CurateError> {
        let started_at = Utc::now();
        let mut set = WorkingSet::new(items)?;
        let initial_count = set.len();
        let mut reports = Vec::with_capacity(stages.len());

        for (index, stage) in stages.iter_mut().enumerate() {
            self.state = RunState::Running { stage_index: index };
            let (next, report) = self.run_stage(index, stage.as_mut(), set, events)?;
            set = next;
            reports.push(report);
        }

        let report = PipelineReport {
            initial_count,
            final_count: set.len(),
            stages: reports,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            initial_count = report.initial_count,
            final_count = report.final_count,
            retention_percent = report.retention_percent(),
            "run completed"
        );

        Ok(PipelineRun {
            survivors: set,
            report,
        })
    }

    fn run_stage(
        &self,
        index: usize,
        stage: &mut dyn Stage,
        set: WorkingSet,
        events: &EventSender,
    ) -> Result<(WorkingSet, StageReport), CurateError> {
        let name = stage.name().to_string();
        let span = tracing::info_span!("stage", name = %name, index);
        let _guard = span.enter();

        let start = Instant::now();
        let count_in = set.len();
        let fatal = |source: StageError| CurateError::Stage {
            stage: name.clone(),
            source,
        };

        events.send(Event::Stage(StageEvent::Started {
            index,
            name: name.clone(),
            count_in,
        }));

        stage.setup(set.items()).map_err(fatal)?;
        events.send(Event::Stage(StageEvent::SetupCompleted {
            index,
            name: name.clone(),
        }));

        let decisions = self.decide_all(index, &*stage, set.items(), events).map_err(fatal)?;
        check_decision_count(&name, decisions.len(), count_in)?;

        let mut drop_reasons: BTreeMap<String, usize> = BTreeMap::new();
        let keep: Vec<bool> = decisions
            .into_iter()
            .map(|decision| {
                if !decision.keep {
                    let reason = decision
                        .reason
                        .unwrap_or_else(|| UNSPECIFIED_REASON.to_string());
                    *drop_reasons.entry(reason).or_default() += 1;
                }
                decision.keep
            })
            .collect();

        let survivors = set.retain_flagged(&keep);
        check_survivors(&name, &set, &survivors)?;
        let count_out = survivors.len();

        let report = StageReport {
            stage_name: name.clone(),
            kind: stage.kind(),
            count_in,
            count_out,
            drop_reasons,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(count_in, count_out, duration_ms = report.duration_ms, "stage completed");
        events.send(Event::Stage(StageEvent::Completed(StageSummary {
            index,
            name,
            count_in,
            count_out,
        })));

        Ok((survivors, report))
    }

    /// One decision per item, in item order
    fn decide_all(
        &self,
        index: usize,
        stage: &dyn Stage,
        items: &[Item],
        events: &EventSender,
    ) -> Result<Vec<Decision>, StageError> {
        let total = items.len();
        let completed = AtomicUsize::new(0);
        let decide = |item: &Item| -> Result<Decision, StageError> {
            let decision = stage.decide(item)?;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            events.send(Event::Stage(StageEvent::Progress(StageProgress {
                index,
                completed: done,
                total,
            })));
            Ok(decision)
        };

        if self.options.parallel {
            items.par_iter().map(decide).collect()
        } else {
            items.iter().map(decide).collect()
        }
    }
}

fn check_decision_count(stage: &str, decisions: usize, items: usize) -> Result<(), CurateError> {
    if decisions == items {
        return Ok(());
    }
    Err(CurateError::InvariantViolation {
        stage: stage.to_string(),
        reason: format!("{decisions} decisions for {items} items"),
    })
}

/// Survivors must be an order-preserving subset of the stage input
fn check_survivors(
    stage: &str,
    input: &WorkingSet,
    survivors: &WorkingSet,
) -> Result<(), CurateError> {
    let reason = if survivors.len() > input.len() {
        format!("output grew from {} to {} items", input.len(), survivors.len())
    } else if !survivors.is_ordered_subset_of(input) {
        "output is not an order-preserving subset of the input".to_string()
    } else {
        return Ok(());
    };
    Err(CurateError::InvariantViolation {
        stage: stage.to_string(),
        reason,
    })
}

impl Default for PipelineEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::StageKind;
    use crate::events::{null_sender, EventChannel};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Drops a fixed set of ids; optionally fails setup
    struct ScriptedStage {
        name: String,
        drop: HashSet<String>,
        fail_setup: bool,
        seen_in_setup: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedStage {
        fn dropping(name: &str, ids: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                drop: ids.iter().map(|s| s.to_string()).collect(),
                fail_setup: false,
                seen_in_setup: Arc::default(),
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail_setup: true,
                ..Self::dropping(name, &[])
            }
        }
    }

    impl Stage for ScriptedStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> StageKind {
            StageKind::PersonDetector
        }

        fn setup(&mut self, items: &[Item]) -> Result<(), StageError> {
            if self.fail_setup {
                return Err(StageError::ResourceLoad {
                    resource: "weights.pt".to_string(),
                    reason: "file not found".to_string(),
                });
            }
            *self.seen_in_setup.lock().unwrap() = items.iter().map(|i| i.id().to_string()).collect();
            Ok(())
        }

        fn decide(&self, item: &Item) -> Result<Decision, StageError> {
            if self.drop.contains(item.id()) {
                Ok(Decision::drop(format!("scripted by {}", self.name)))
            } else {
                Ok(Decision::keep())
            }
        }
    }

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter().map(|id| Item::new(*id, format!("/in/{id}"))).collect()
    }

    fn ids(set: &WorkingSet) -> Vec<&str> {
        set.ids().collect()
    }

    #[test]
    fn stages_filter_in_order_and_report_counts() {
        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ScriptedStage::dropping("first", &["B", "C"])),
            Box::new(ScriptedStage::dropping("second", &["D"])),
        ];
        let mut engine = PipelineEngine::default();

        let run = engine
            .run(items(&["A", "B", "C", "D", "E"]), &mut stages, &null_sender())
            .unwrap();

        assert_eq!(ids(&run.survivors), vec!["A", "E"]);
        let counts: Vec<(usize, usize)> = run
            .report
            .stages
            .iter()
            .map(|s| (s.count_in, s.count_out))
            .collect();
        assert_eq!(counts, vec![(5, 3), (3, 2)]);
        assert_eq!(run.report.retention_percent(), 40.0);
        assert_eq!(run.report.stages[0].drop_reasons["scripted by first"], 2);
        assert_eq!(engine.state(), &RunState::Completed);
    }

    #[test]
    fn sequential_and_parallel_runs_agree() {
        let input: Vec<String> = (0..200).map(|i| format!("img_{i:03}")).collect();
        let input_refs: Vec<&str> = input.iter().map(String::as_str).collect();
        let dropped: Vec<&str> = input_refs.iter().copied().step_by(3).collect();

        let run_with = |parallel| {
            let mut stages: Vec<Box<dyn Stage>> =
                vec![Box::new(ScriptedStage::dropping("thin", &dropped))];
            PipelineEngine::new(EngineOptions { parallel })
                .run(items(&input_refs), &mut stages, &null_sender())
                .unwrap()
                .survivors
        };

        let parallel = run_with(true);
        let sequential = run_with(false);
        assert_eq!(ids(&parallel), ids(&sequential));
        assert_eq!(parallel.len(), 133);
    }

    #[test]
    fn setup_failure_aborts_with_stage_name() {
        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ScriptedStage::dropping("dedupe", &[])),
            Box::new(ScriptedStage::failing("person_detector")),
            Box::new(ScriptedStage::dropping("never_runs", &[])),
        ];
        let mut engine = PipelineEngine::default();

        let error = engine
            .run(items(&["A", "B"]), &mut stages, &null_sender())
            .unwrap_err();

        assert_eq!(error.stage_name(), Some("person_detector"));
        match engine.state() {
            RunState::Aborted { stage, reason } => {
                assert_eq!(stage.as_deref(), Some("person_detector"));
                assert!(reason.contains("weights.pt"));
            }
            other => panic!("Expected Aborted, got {:?}", other),
        }
    }

    #[test]
    fn finished_engine_refuses_to_run_again() {
        let mut engine = PipelineEngine::default();
        let mut failing: Vec<Box<dyn Stage>> = vec![Box::new(ScriptedStage::failing("person"))];
        engine
            .run(items(&["A"]), &mut failing, &null_sender())
            .unwrap_err();

        let mut healthy: Vec<Box<dyn Stage>> = vec![Box::new(ScriptedStage::dropping("ok", &[]))];
        let error = engine
            .run(items(&["A"]), &mut healthy, &null_sender())
            .unwrap_err();
        assert!(matches!(error, CurateError::EngineReused { state: "aborted" }));
        assert!(matches!(engine.state(), RunState::Aborted { .. }));

        let mut engine = PipelineEngine::default();
        engine.run(items(&["A"]), &mut healthy, &null_sender()).unwrap();
        let error = engine
            .run(items(&["A"]), &mut healthy, &null_sender())
            .unwrap_err();
        assert!(matches!(error, CurateError::EngineReused { state: "completed" }));
        assert_eq!(engine.state(), &RunState::Completed);
    }

    fn set(ids: &[&str]) -> WorkingSet {
        WorkingSet::new(items(ids)).unwrap()
    }

    #[test]
    fn survivors_must_be_an_ordered_subset() {
        let input = set(&["A", "B", "C"]);

        assert!(check_survivors("s", &input, &set(&["A", "C"])).is_ok());
        assert!(check_survivors("s", &input, &set(&[])).is_ok());

        for bad in [set(&["C", "A"]), set(&["A", "Z"]), set(&["A", "B", "C", "D"])] {
            match check_survivors("s", &input, &bad) {
                Err(CurateError::InvariantViolation { stage, .. }) => assert_eq!(stage, "s"),
                other => panic!("Expected InvariantViolation, got {:?}", other),
            }
        }
    }

    #[test]
    fn decision_count_must_match_input() {
        assert!(check_decision_count("s", 3, 3).is_ok());
        let error = check_decision_count("s", 2, 3).unwrap_err();
        assert_eq!(error.stage_name(), Some("s"));
        assert!(error.to_string().contains("2 decisions for 3 items"));
    }

    #[test]
    fn duplicate_ids_are_rejected_before_any_stage() {
        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(ScriptedStage::failing("boom"))];

        let error = PipelineEngine::default()
            .run(items(&["A", "A"]), &mut stages, &null_sender())
            .unwrap_err();

        assert!(matches!(error, CurateError::DuplicateItem { .. }));
    }

    /// Fails on every decide call
    struct BrokenDecide;

    impl Stage for BrokenDecide {
        fn name(&self) -> &str {
            "broken"
        }

        fn kind(&self) -> StageKind {
            StageKind::Age
        }

        fn setup(&mut self, _items: &[Item]) -> Result<(), StageError> {
            Ok(())
        }

        fn decide(&self, _item: &Item) -> Result<Decision, StageError> {
            Err(StageError::NotReady)
        }
    }

    #[test]
    fn decide_errors_are_fatal() {
        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(BrokenDecide)];
        let error = PipelineEngine::default()
            .run(items(&["A"]), &mut stages, &null_sender())
            .unwrap_err();

        assert!(matches!(
            error,
            CurateError::Stage {
                source: StageError::NotReady,
                ..
            }
        ));
    }

    #[test]
    fn later_stages_see_only_survivors() {
        let second = ScriptedStage::dropping("second", &[]);
        let seen = Arc::clone(&second.seen_in_setup);
        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ScriptedStage::dropping("first", &["B"])),
            Box::new(second),
        ];

        PipelineEngine::default()
            .run(items(&["A", "B", "C"]), &mut stages, &null_sender())
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["A", "C"]);
    }

    #[test]
    fn events_follow_stage_lifecycle() {
        let (sender, receiver) = EventChannel::new();
        let mut stages: Vec<Box<dyn Stage>> =
            vec![Box::new(ScriptedStage::dropping("only", &["B"]))];

        PipelineEngine::new(EngineOptions { parallel: false })
            .run(items(&["A", "B"]), &mut stages, &sender)
            .unwrap();
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        assert!(matches!(events[0], Event::Pipeline(PipelineEvent::Started { stage_count: 1 })));
        assert!(matches!(events[1], Event::Stage(StageEvent::Started { count_in: 2, .. })));
        assert!(matches!(events[2], Event::Stage(StageEvent::SetupCompleted { .. })));
        assert!(matches!(
            events[events.len() - 2],
            Event::Stage(StageEvent::Completed(StageSummary { count_out: 1, .. }))
        ));
        assert!(matches!(
            events.last(),
            Some(Event::Pipeline(PipelineEvent::Completed { .. }))
        ));
    }

    #[test]
    fn empty_input_runs_every_stage() {
        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(ScriptedStage::dropping("a", &[]))];
        let run = PipelineEngine::default()
            .run(Vec::new(), &mut stages, &null_sender())
            .unwrap();

        assert!(run.survivors.is_empty());
        assert_eq!(run.report.stages.len(), 1);
        assert_eq!(run.report.retention_percent(), 0.0);
    }
}
