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

// Build automation and asset tooling for Stowage
// Run with: cargo xtask <command>

mod commands;
mod helpers;

use clap::{Parser, Subcommand};
use commands::ci::CiTask;
use helpers::*;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "xtask", version, about = "Workspace and asset bundle tooling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build all crates in the workspace
    Build,
    /// Run all tests in the workspace
    Test,
    /// Run `cargo check` on all crates
    Check,
    /// Format all code in the workspace
    Format,
    /// Run clippy on all crates with warnings as errors
    Clippy,
    /// Run all CI tasks (build, test, check, format, clippy)
    All,
    /// Asset bundle pipeline
    #[command(subcommand)]
    Assets(AssetsCommand),
}

#[derive(Subcommand)]
enum AssetsCommand {
    /// Resolve, assign and pack the assets described by a config file
    Pack {
        #[arg(long, default_value = "Assets.toml")]
        config: PathBuf,
    },
    /// Decode a built manifest and print its tables
    Inspect {
        /// Directory holding `manifest.ab`
        dir: PathBuf,
        /// Also print the bundle dependencies of this platform manifest
        #[arg(long)]
        platform: Option<String>,
        /// Leading bytes to skip in every file
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
}

fn main() {
    stowage_telemetry::init_logging("info");

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("{}", BANNER);
        println!(
            "\n{}{}Usage:{} cargo xtask <command> (see `cargo xtask help`)",
            BOLD, YELLOW, RESET
        );
        return;
    };

    let result = match command {
        Commands::Build => CiTask::Build.run(),
        Commands::Test => CiTask::Test.run(),
        Commands::Check => CiTask::Check.run(),
        Commands::Format => CiTask::Format.run(),
        Commands::Clippy => CiTask::Clippy.run(),
        Commands::All => commands::ci::all(),
        Commands::Assets(AssetsCommand::Pack { config }) => commands::assets::pack(&config),
        Commands::Assets(AssetsCommand::Inspect {
            dir,
            platform,
            offset,
        }) => commands::assets::inspect(&dir, platform.as_deref(), offset),
    };

    if let Err(e) = result {
        print_error(&format!("{e:#}"));
        process::exit(1);
    }
}
