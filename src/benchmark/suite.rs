//! Suite orchestration
//!
//! The tests contend for the same GPU, so they run strictly one after another,
//! each in its own child process (`gpu-bench run <test>`). The orchestrator
//! blocks on every child before launching the next. A failed test does not stop
//! the suite; scoring decides later whether the missing log is acceptable.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use super::runner::StopSignal;
use crate::config::TestKind;

/// Pause between tests so the previous process has released the device.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestStatus {
    Completed,
    Failed(String),
    /// Not started because a stop was requested
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub test: TestKind,
    pub status: TestStatus,
}

/// Runs a single test to completion and reports how it ended.
pub trait TestLauncher {
    fn launch(&mut self, test: TestKind) -> Result<TestStatus>;
}

/// Launches tests as child processes of the current executable.
#[derive(Debug, Clone)]
pub struct ChildProcessLauncher {
    program: PathBuf,
}

impl ChildProcessLauncher {
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().context("Could not locate the gpu-bench executable")?;
        Ok(Self { program })
    }
}

impl TestLauncher for ChildProcessLauncher {
    fn launch(&mut self, test: TestKind) -> Result<TestStatus> {
        let status = Command::new(&self.program)
            .arg("run")
            .arg(test.name())
            .status()
            .with_context(|| format!("Failed to start {} test process", test))?;

        if status.success() {
            Ok(TestStatus::Completed)
        } else {
            Ok(TestStatus::Failed(match status.code() {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            }))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteRunner {
    tests: Vec<TestKind>,
    settle_delay: Duration,
}

impl Default for SuiteRunner {
    fn default() -> Self {
        Self {
            tests: TestKind::ALL.to_vec(),
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl SuiteRunner {
    #[cfg(test)]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Run every test in order. Launch errors are recorded as failures.
    pub fn run(&self, launcher: &mut dyn TestLauncher, stop: &StopSignal) -> Vec<TestOutcome> {
        let mut outcomes = Vec::with_capacity(self.tests.len());

        for (position, &test) in self.tests.iter().enumerate() {
            if stop.is_stopped() {
                outcomes.push(TestOutcome {
                    test,
                    status: TestStatus::Skipped,
                });
                continue;
            }

            if position > 0 && !self.settle_delay.is_zero() {
                thread::sleep(self.settle_delay);
            }

            info!(test = %test, "Running test {}/{}", position + 1, self.tests.len());
            let status = match launcher.launch(test) {
                Ok(status) => status,
                Err(err) => TestStatus::Failed(format!("{:#}", err)),
            };
            if let TestStatus::Failed(reason) = &status {
                warn!(test = %test, "Test failed: {}", reason);
            }

            outcomes.push(TestOutcome { test, status });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedLauncher {
        launched: Vec<TestKind>,
        fail: Option<TestKind>,
        stop_after: Option<(TestKind, StopSignal)>,
    }

    impl TestLauncher for ScriptedLauncher {
        fn launch(&mut self, test: TestKind) -> Result<TestStatus> {
            self.launched.push(test);
            if let Some((after, stop)) = &self.stop_after {
                if *after == test {
                    stop.stop();
                }
            }
            if self.fail == Some(test) {
                anyhow::bail!("window creation failed");
            }
            Ok(TestStatus::Completed)
        }
    }

    fn launcher() -> ScriptedLauncher {
        ScriptedLauncher {
            launched: Vec::new(),
            fail: None,
            stop_after: None,
        }
    }

    #[test]
    fn runs_tests_in_fixed_order() {
        let mut launcher = launcher();
        let outcomes = SuiteRunner::default()
            .with_settle_delay(Duration::ZERO)
            .run(&mut launcher, &StopSignal::new());

        assert_eq!(launcher.launched, TestKind::ALL.to_vec());
        assert!(outcomes.iter().all(|o| o.status == TestStatus::Completed));
    }

    #[test]
    fn failed_test_does_not_stop_the_suite() {
        let mut launcher = launcher();
        launcher.fail = Some(TestKind::Triangles);
        let outcomes = SuiteRunner::default()
            .with_settle_delay(Duration::ZERO)
            .run(&mut launcher, &StopSignal::new());

        assert_eq!(launcher.launched.len(), 3);
        assert_eq!(
            outcomes[1].status,
            TestStatus::Failed("window creation failed".to_string())
        );
        assert_eq!(outcomes[2].status, TestStatus::Completed);
    }

    #[test]
    fn stop_skips_remaining_tests() {
        let stop = StopSignal::new();
        let mut launcher = launcher();
        launcher.stop_after = Some((TestKind::Butterfly, stop.clone()));
        let outcomes = SuiteRunner::default()
            .with_settle_delay(Duration::ZERO)
            .run(&mut launcher, &stop);

        assert_eq!(launcher.launched, vec![TestKind::Butterfly]);
        assert_eq!(outcomes[1].status, TestStatus::Skipped);
        assert_eq!(outcomes[2].status, TestStatus::Skipped);
    }
}
