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

//! Traits for long-lived subsystems that are ticked by the host (Agents).

/// A snapshot of an agent's health, reported for telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStatus {
    /// Name of the reporting agent.
    pub agent: &'static str,
    /// Health score (0.0 to 1.0). 1.0 means no failures since the last report.
    pub health_score: f32,
    /// True if the agent is blocked and cannot make progress.
    pub is_stalled: bool,
    /// Human-readable status message.
    pub message: String,
}

/// The interface every Stowage agent exposes to its host.
///
/// The host calls [`update`](Agent::update) once per tick from the thread
/// that owns the agent. Agents never spawn work that outlives a call to
/// `update` without owning its completion.
pub trait Agent: Send {
    /// A short, stable name used in logs and telemetry.
    fn name(&self) -> &'static str;

    /// Advances the agent's internal state by one tick.
    fn update(&mut self);

    /// Reports the current status and health of the agent.
    fn report_status(&self) -> AgentStatus;
}
