//! The bounded async run loop.
//!
//! [`run_cluster`] drives one cluster, its directory, and the loopback
//! network until every watched root agent has concluded or the tick
//! bound is hit. The loop is the only async code in the workspace: the
//! agents themselves stay synchronous and non-blocking, the runner just
//! paces their ticks.
//!
//! The tick bound is an observation bound, not a protocol timeout: a
//! negotiation that is still waiting when the bound is hit is left
//! exactly as it was, unfinished. The protocol itself never times out.

use std::time::Duration;

use tracing::{debug, info};

use palaver_types::AgentId;

use crate::cluster::Cluster;
use crate::directory::YellowPages;
use crate::loopback::LoopbackNetwork;

/// Settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Hard bound on the number of ticks to run.
    pub max_ticks: u64,
    /// Pause between ticks; [`Duration::ZERO`] runs flat out.
    pub tick_interval: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_ticks: 1000,
            tick_interval: Duration::from_millis(10),
        }
    }
}

/// Why the run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEndReason {
    /// Every watched root agent concluded its negotiation.
    AllSettled,
    /// The tick bound was hit with negotiations still pending.
    MaxTicks,
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of ticks executed.
    pub ticks: u64,
    /// Why the loop stopped.
    pub end_reason: RunEndReason,
}

/// Callback invoked after each tick completes.
///
/// Implementations can use this to snapshot state, collect metrics, or
/// drive a UI; the runner itself only checks the watched roots.
pub trait TickObserver {
    /// Called after a tick, with the tick number and the cluster state.
    fn on_tick(&mut self, tick: u64, cluster: &Cluster);
}

/// A no-op tick observer for plain runs and tests.
#[derive(Debug, Default)]
pub struct NoOpObserver;

impl TickObserver for NoOpObserver {
    fn on_tick(&mut self, _tick: u64, _cluster: &Cluster) {}
}

/// Run the cluster until every watched root concludes or the tick bound
/// is hit.
///
/// Each tick pumps the directory first (so registrations and queries
/// resolve before agents act on them) and then steps the cluster.
pub async fn run_cluster(
    cluster: &mut Cluster,
    directory: &mut YellowPages,
    net: &mut LoopbackNetwork,
    roots: &[AgentId],
    options: &RunnerOptions,
    observer: &mut dyn TickObserver,
) -> RunSummary {
    let mut ticks = 0;
    while ticks < options.max_ticks {
        directory.pump(net);
        cluster.step(net);
        ticks = ticks.saturating_add(1);
        observer.on_tick(ticks, cluster);

        let all_settled = roots
            .iter()
            .all(|id| cluster.outcome(*id).is_some_and(|o| o.finished));
        if all_settled {
            info!(ticks, "all watched negotiations settled");
            return RunSummary {
                ticks,
                end_reason: RunEndReason::AllSettled,
            };
        }

        if !options.tick_interval.is_zero() {
            tokio::time::sleep(options.tick_interval).await;
        }
    }
    debug!(ticks, "tick bound hit with negotiations pending");
    RunSummary {
        ticks,
        end_reason: RunEndReason::MaxTicks,
    }
}
