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

use crate::helpers::*;
use anyhow::Result;
use std::time::Instant;

/// One workspace CI step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiTask {
    Build,
    Test,
    Check,
    Format,
    Clippy,
}

impl CiTask {
    /// The pipeline order used by `all`.
    pub const PIPELINE: [CiTask; 5] = [
        CiTask::Build,
        CiTask::Test,
        CiTask::Check,
        CiTask::Format,
        CiTask::Clippy,
    ];

    fn title(self) -> &'static str {
        match self {
            CiTask::Build => "Building All Crates",
            CiTask::Test => "Running All Tests",
            CiTask::Check => "Checking All Crates",
            CiTask::Format => "Formatting Code",
            CiTask::Clippy => "Running Clippy",
        }
    }

    fn label(self) -> &'static str {
        match self {
            CiTask::Build => "Build",
            CiTask::Test => "Tests",
            CiTask::Check => "Check",
            CiTask::Format => "Format",
            CiTask::Clippy => "Clippy",
        }
    }

    fn style(self) -> (&'static str, &'static str) {
        match self {
            CiTask::Build => (HAMMER, BLUE),
            CiTask::Test => (TEST_TUBE, GREEN),
            CiTask::Check => (MAGNIFIER, CYAN),
            CiTask::Format => (BRUSH, MAGENTA),
            CiTask::Clippy => (CLIPPY, YELLOW),
        }
    }

    fn info(self) -> &'static str {
        match self {
            CiTask::Build => "Compiling all workspace crates in debug mode",
            CiTask::Test => "Running unit tests, integration tests and doc tests",
            CiTask::Check => "Checking code for errors without building executables",
            CiTask::Format => "Formatting code using rustfmt with default settings",
            CiTask::Clippy => "Running Clippy linter with warnings as errors",
        }
    }

    /// Arguments passed to `cargo`.
    pub fn cargo_args(self) -> &'static [&'static str] {
        match self {
            CiTask::Build => &["build", "--workspace", "--exclude", "xtask"],
            CiTask::Test => &["test", "--workspace"],
            CiTask::Check => &["check", "--workspace"],
            // `fmt` takes `--all`, not `--workspace`.
            CiTask::Format => &["fmt", "--all"],
            CiTask::Clippy => &["clippy", "--workspace", "--", "-D", "warnings"],
        }
    }

    pub fn run(self) -> Result<()> {
        let (emoji, color) = self.style();
        print_task_start(self.title(), emoji, color);
        print_info(self.info());
        execute_command("cargo", self.cargo_args(), self.label())
    }
}

pub fn all() -> Result<()> {
    println!("{}", BANNER);
    println!("{}{}Starting full build pipeline...{}", BOLD, CYAN, RESET);
    println!(
        "{}💡 Pipeline:{} This will run build → test → check → format → clippy",
        BOLD, RESET
    );

    let start_time = Instant::now();
    let total_tasks = CiTask::PIPELINE.len();
    let mut failed = Vec::new();

    for (i, task) in CiTask::PIPELINE.iter().enumerate() {
        println!(
            "\n{}{}[{}/{}] {} Phase{}",
            BOLD,
            BLUE,
            i + 1,
            total_tasks,
            task.label(),
            RESET
        );
        if task.run().is_err() {
            failed.push(task.label());
        }
    }

    println!(
        "\n{}{}╔═══════════════════════════════════════╗{}",
        BOLD, CYAN, RESET
    );
    println!(
        "{}{}║            PIPELINE SUMMARY           ║{}",
        BOLD, CYAN, RESET
    );
    println!(
        "{}{}╚═══════════════════════════════════════╝{}",
        BOLD, CYAN, RESET
    );

    if failed.is_empty() {
        println!(
            "{}{} {} All {} tasks completed successfully! {}{}",
            BOLD, GREEN, CHECK, total_tasks, ROCKET, RESET
        );
    } else {
        println!(
            "{}{} ⚠ {}/{} tasks completed (failed: {}){}",
            BOLD,
            YELLOW,
            total_tasks - failed.len(),
            total_tasks,
            failed.join(", "),
            RESET
        );
    }
    println!(
        "{}{}Total time: {:.2}s{}",
        BOLD,
        BLUE,
        start_time.elapsed().as_secs_f64(),
        RESET
    );

    if !failed.is_empty() {
        anyhow::bail!(
            "Pipeline failed with {}/{} successful tasks.",
            total_tasks - failed.len(),
            total_tasks
        );
    }
    Ok(())
}
