//! Headless match runner implementation.

use std::io::{BufRead, Write};

use lane_core::config::SimConfig;
use lane_core::entity::{Entity, Team};
use lane_core::math::Fixed;
use lane_core::rng::RandomSource;
use lane_core::simulation::Simulator;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{HeadlessError, Result};
use crate::protocol::{CombatView, MatchView, PlayerView, Request, Response, TeamCounts};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output the full state after every tick request (vs only the hash).
    pub auto_state_output: bool,
}

/// Drives one match from JSON-lines requests.
pub struct HeadlessRunner {
    sim: Simulator,
    config: HeadlessConfig,
}

impl HeadlessRunner {
    /// Create a runner for a fresh match.
    pub fn new(sim_config: SimConfig, seed: u64) -> Result<Self> {
        Ok(Self::with_simulator(
            Simulator::with_config(sim_config, seed)?,
            HeadlessConfig::default(),
        ))
    }

    /// Create a runner around an existing simulation.
    pub fn with_simulator(sim: Simulator, config: HeadlessConfig) -> Self {
        Self { sim, config }
    }

    /// The simulation being driven.
    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Apply one request. Returns the response and whether the session ends.
    pub fn handle(&mut self, request: Request) -> (Response, bool) {
        let name = request.name();
        let response = match request {
            Request::Tick { count } => {
                self.sim.step_n(u64::from(count));
                if self.config.auto_state_output {
                    Response::State(match_view(&self.sim))
                } else {
                    Response::StateHash {
                        tick: self.sim.get_tick(),
                        hash: self.sim.state_hash(),
                    }
                }
            }
            Request::Query => Response::State(match_view(&self.sim)),
            Request::Command { player, action } => {
                match self.sim.apply_command(&player, action.into()) {
                    Ok(()) => Response::ack(name),
                    Err(e) => {
                        debug!(%player, error = %e, "Command rejected");
                        Response::error(e.to_string(), Some(name))
                    }
                }
            }
            Request::Actions { player } => match self.sim.available_actions(&player) {
                Ok(actions) => Response::Actions { player, actions },
                Err(e) => Response::error(e.to_string(), Some(name)),
            },
            Request::Hash => Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            },
            Request::Quit => return (Response::Bye, true),
        };
        (response, false)
    }

    /// Run the request loop until `quit` or end of input.
    ///
    /// Reads JSON requests from `input`, writes responses to `output`.
    pub fn run<I: BufRead, O: Write>(&mut self, input: I, mut output: O) -> Result<()> {
        info!(tick = self.sim.get_tick(), "Headless runner ready");
        output.write_all(Response::ready(self.sim.get_tick()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (response, quit) = match Request::from_json(line) {
                Ok(request) => self.handle(request),
                Err(e) => {
                    warn!(error = %e, "Failed to parse request");
                    (Response::error(format!("Invalid JSON: {e}"), None), false)
                }
            };
            output.write_all(response.to_json_line().as_bytes())?;
            output.flush()?;
            if quit {
                info!("Received quit request");
                break;
            }
        }
        Ok(())
    }
}

fn to_display(value: Fixed) -> f64 {
    value.to_num::<f64>()
}

fn player_view(entity: &Entity) -> Option<PlayerView> {
    let data = entity.player()?;
    Some(PlayerView {
        player: data.player_id.clone(),
        entity: entity.id,
        team: entity.team,
        state: entity.state(),
        x: to_display(entity.position.x),
        y: to_display(entity.position.y),
        health: to_display(entity.health()),
        max_health: to_display(entity.stats.max_health()),
        level: entity.stats.leveled().level(),
        gold: to_display(data.inventory.gold),
        items: data.inventory.items().to_vec(),
    })
}

fn count_by_team<'a>(entities: impl Iterator<Item = &'a Entity>) -> TeamCounts {
    entities.fold(TeamCounts::default(), |mut counts, entity| {
        match entity.team {
            Team::Blue => counts.blue += 1,
            Team::Red => counts.red += 1,
            Team::Neutral => {}
        }
        counts
    })
}

/// Build a display snapshot of the match.
pub fn match_view<R: RandomSource>(sim: &Simulator<R>) -> MatchView {
    let map = sim.map();
    let living = || map.entities().iter().filter(|e| e.is_alive());
    MatchView {
        tick: sim.get_tick(),
        hash: sim.state_hash(),
        waves_spawned: map.waves_spawned(),
        players: sim.get_players().into_iter().filter_map(player_view).collect(),
        waves: count_by_team(living().filter(|e| e.is_wave())),
        turrets: count_by_team(living().filter(|e| e.is_turret())),
        combats: map
            .combats()
            .iter()
            .map(|combat| CombatView {
                id: combat.id().0,
                blue: combat.bucket(Team::Blue).to_vec(),
                red: combat.bucket(Team::Red).to_vec(),
                disengage_remaining: combat.disengage_remaining(),
            })
            .collect(),
    }
}

/// Result of an unattended match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    /// Seed the match ran with.
    pub seed: u64,
    /// Final state.
    #[serde(flatten)]
    pub view: MatchView,
}

/// Run a match with no player orders for `ticks` steps.
pub fn run_match(config: SimConfig, seed: u64, ticks: u64) -> Result<MatchSummary> {
    let mut sim = Simulator::with_config(config, seed)?;
    sim.step_n(ticks);
    info!(seed, ticks, hash = sim.state_hash(), "Match complete");
    Ok(MatchSummary {
        seed,
        view: match_view(&sim),
    })
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Seed every run used.
    pub seed: u64,
    /// Ticks per run.
    pub ticks: u64,
    /// Final hash of each independent run.
    pub run_hashes: Vec<u64>,
    /// Final hash of the copy taken halfway through the first run.
    pub copy_hash: u64,
    /// Whether every hash agrees.
    pub deterministic: bool,
}

/// Run the same match `runs` times and once more from a mid-match copy.
pub fn verify(config: &SimConfig, seed: u64, ticks: u64, runs: usize) -> Result<VerifyReport> {
    let runs = runs.max(1);
    let mut run_hashes = Vec::with_capacity(runs);
    let mut copy_hash = None;

    for run in 0..runs {
        let mut sim = Simulator::with_config(config.clone(), seed)?;
        if run == 0 {
            sim.step_n(ticks / 2);
            let mut copy = sim.clone();
            copy.step_n(ticks - ticks / 2);
            copy_hash = Some(copy.state_hash());
            sim.step_n(ticks - ticks / 2);
        } else {
            sim.step_n(ticks);
        }
        debug!(run, hash = sim.state_hash(), "Run finished");
        run_hashes.push(sim.state_hash());
    }

    let copy_hash = copy_hash.ok_or_else(|| HeadlessError::Divergence("no runs".to_string()))?;
    let deterministic = run_hashes.iter().all(|&h| h == copy_hash);
    if !deterministic {
        warn!(seed, ?run_hashes, copy_hash, "Hashes diverged");
    }
    Ok(VerifyReport {
        seed,
        ticks,
        run_hashes,
        copy_hash,
        deterministic,
    })
}
