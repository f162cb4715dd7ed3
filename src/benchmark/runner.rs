//! Staged benchmark runner
//!
//! Drives one test through `WarmingUp -> Running -> Finished`. During warm-up
//! frames are rendered with the first stage's workload and their timings are
//! thrown away. While running, every iteration:
//!
//! 1. reads the elapsed test time,
//! 2. asks the stager for the active stage and regenerates the workload on a
//!    transition,
//! 3. renders and presents one frame under the frame clock,
//! 4. feeds the frame duration to the window aggregator,
//! 5. appends any emitted record to the record log before the next frame.
//!
//! A stop request ends the run immediately; the partially accumulated window
//! is discarded.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::clock::{Clock, FrameClock, SystemClock};
use super::stager::{Stage, StageTracker, WorkloadStager};
use super::window::{AggregatedRecord, SamplingWindowAggregator};
use crate::config::{TestConfig, TestKind};
use crate::error::RunError;
use crate::record::RecordLogWriter;
use crate::render::{create_renderer, RenderContext, Renderer};

/// Seed for workload data so repeated runs draw the same scene.
const RENDER_SEED: u64 = 0x5eed_0f_6b_e4c4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    WarmingUp,
    Running,
    Finished,
}

/// Shared flag asking a running test to stop (window close, Ctrl-C).
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one test run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub test: TestKind,
    pub records_written: usize,
    /// Frames rendered while running; warm-up frames are not counted
    pub frames_rendered: u64,
    pub stopped_early: bool,
    pub final_stage: Stage,
}

pub struct StagedBenchmarkRunner<C: Clock = SystemClock> {
    test: TestConfig,
    ctx: RenderContext,
    renderer: Box<dyn Renderer>,
    log: RecordLogWriter,
    clock: C,
    stop: StopSignal,
    state: RunnerState,
}

impl StagedBenchmarkRunner<SystemClock> {
    /// Create the render context and a fresh record log for `test`.
    ///
    /// The render context is created first, so a setup failure leaves the
    /// previous run's log untouched.
    pub fn setup(
        test: TestConfig,
        width: u32,
        height: u32,
        log_path: &Path,
        stop: StopSignal,
    ) -> Result<Self, RunError> {
        let ctx = RenderContext::new(width, height)?;
        let renderer = create_renderer(test.kind, RENDER_SEED);
        let log = RecordLogWriter::create(log_path, test.kind.workload_label())?;
        Ok(Self::new(test, ctx, renderer, log, SystemClock::new(), stop))
    }
}

impl<C: Clock> StagedBenchmarkRunner<C> {
    pub fn new(
        test: TestConfig,
        ctx: RenderContext,
        renderer: Box<dyn Renderer>,
        log: RecordLogWriter,
        clock: C,
        stop: StopSignal,
    ) -> Self {
        Self {
            test,
            ctx,
            renderer,
            log,
            clock,
            stop,
            state: RunnerState::WarmingUp,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run the test to completion or until stopped.
    ///
    /// A record log failure aborts the test; rows already appended stay on disk.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        let kind = self.test.kind;
        let label = kind.workload_label();
        let stager = WorkloadStager::new(
            self.test.workload_schedule.clone(),
            self.test.stage_duration_secs,
        );
        let mut tracker = StageTracker::default();

        let first = stager.first_stage();
        tracker.observe(first);
        self.renderer.regenerate(first.workload_size);
        info!(test = %kind, "Starting stage 1 with {} {}", first.workload_size, label.to_lowercase());

        self.state = RunnerState::WarmingUp;
        self.warm_up();

        self.state = RunnerState::Running;
        let origin = self.now_secs();
        let mut window = SamplingWindowAggregator::new(self.test.window_interval_secs, origin);
        let mut frame_clock = FrameClock::new();
        let mut summary = RunSummary {
            test: kind,
            records_written: 0,
            frames_rendered: 0,
            stopped_early: false,
            final_stage: first,
        };

        let result = loop {
            if self.stop.is_stopped() {
                summary.stopped_early = true;
                let pending = window.pending_samples();
                window.discard(self.now_secs());
                debug!(test = %kind, pending, "Stop requested, discarding partial window");
                break Ok(());
            }

            let elapsed = self.now_secs() - origin;
            if elapsed >= self.test.test_duration_secs {
                break Ok(());
            }

            let stage = stager.current_stage(elapsed);
            if tracker.observe(stage) {
                info!(
                    test = %kind,
                    "Starting stage {} with {} {}",
                    stage.index + 1,
                    stage.workload_size,
                    label.to_lowercase()
                );
                self.renderer.regenerate(stage.workload_size);
                debug!(test = %kind, workload = self.renderer.workload_size(), "Workload regenerated");
            }
            summary.final_stage = stage;

            frame_clock.begin(&self.clock);
            self.renderer.draw(&mut self.ctx, elapsed as f32);
            self.ctx.present();
            let frame_secs = frame_clock.end(&self.clock);
            summary.frames_rendered += 1;

            window.observe(frame_secs);

            let now = self.now_secs();
            if let Some(record) = window.flush_if_due(now, now - origin, stage) {
                if let Err(err) = self.log.append(&record) {
                    break Err(err);
                }
                log_record(label, &record);
                summary.records_written += 1;
            }
        };

        self.state = RunnerState::Finished;
        result?;

        info!(
            test = %kind,
            state = ?self.state,
            records = summary.records_written,
            frames = summary.frames_rendered,
            stopped_early = summary.stopped_early,
            log = %self.log.path().display(),
            "Test finished"
        );
        Ok(summary)
    }

    fn warm_up(&mut self) {
        let duration = self.test.warm_up_secs;
        if duration <= 0.0 {
            return;
        }

        info!(test = %self.test.kind, "Warming up...");
        let start = self.now_secs();
        loop {
            if self.stop.is_stopped() {
                return;
            }
            let elapsed = self.now_secs() - start;
            if elapsed >= duration {
                return;
            }
            self.renderer.draw(&mut self.ctx, elapsed as f32);
            self.ctx.present();
        }
    }

    fn now_secs(&self) -> f64 {
        self.clock.now().as_secs_f64()
    }
}

fn log_record(label: &str, record: &AggregatedRecord) {
    info!(
        "Time: {:.1}s, Stage: {}, {}: {}, Avg FPS: {:.1}, Min FPS: {:.1}",
        record.elapsed_secs,
        record.stage,
        label,
        record.workload_size,
        record.avg_fps,
        record.min_fps
    );
}
