// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use swarmos_core::domain::events::SwarmEvent;
use swarmos_core::domain::node_config::NodeConfigManifest;
use swarmos_core::infrastructure::EventBusError;
use swarmos_swarm::application::SwarmService;
use swarmos_swarm::{AlgorithmParams, AlgorithmType, OptimizationProblem, SwarmConfig, SwarmStatus};

use crate::embedded::EmbeddedNode;

#[derive(Subcommand)]
pub enum SwarmCommand {
    /// Run an optimization swarm in-process until it finishes
    Run {
        /// Algorithm (pso, de, ga, mock)
        #[arg(short, long, default_value = "pso")]
        algorithm: AlgorithmType,

        /// Objective function (sphere, rastrigin, rosenbrock, ackley, sum)
        #[arg(short, long, default_value = "sphere")]
        objective: String,

        #[arg(short, long, default_value_t = 2)]
        dimensions: usize,

        /// Search bounds applied to every dimension, as LOW:HIGH
        #[arg(short, long, default_value = "-5:5", value_parser = parse_bounds, allow_hyphen_values = true)]
        bounds: (f64, f64),

        #[arg(short = 'n', long, default_value_t = 100)]
        max_iterations: u64,

        /// Stop early once the best fitness reaches this value
        #[arg(short, long)]
        target: Option<f64>,

        /// Maximize the objective instead of minimizing it
        #[arg(long)]
        maximize: bool,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Print every improvement of the best solution
        #[arg(long)]
        progress: bool,
    },
}

pub async fn handle_command(command: SwarmCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        SwarmCommand::Run {
            algorithm,
            objective,
            dimensions,
            bounds,
            max_iterations,
            target,
            maximize,
            seed,
            progress,
        } => {
            let config = NodeConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
            let node = EmbeddedNode::new(&config).await?;

            if !node.swarms.objectives().contains(&objective) {
                println!(
                    "{}",
                    format!("⚠ Unknown objective '{}', falling back to 'sum'", objective).yellow()
                );
            }
            let problem = OptimizationProblem::new(
                dimensions,
                vec![bounds; dimensions],
                node.swarms.objectives().resolve(&objective),
                !maximize,
            )?;

            let mut params = AlgorithmParams::new();
            if let Some(seed) = seed {
                params = params.with("seed", seed);
            }
            let mut swarm_config = SwarmConfig::new(
                format!("{}-{}", algorithm.as_str().to_lowercase(), objective),
                algorithm,
                problem,
                max_iterations,
            )
            .with_params(params);
            if let Some(target) = target {
                swarm_config = swarm_config.with_target(target);
            }

            let swarm = node.swarms.create_swarm(swarm_config).await?;
            println!(
                "Running {} on {} ({} dimensions, {} iterations max)",
                algorithm.to_string().bold(),
                objective.bold(),
                dimensions,
                max_iterations
            );

            let printer = progress.then(|| {
                let mut events = node.event_bus.subscribe_swarm(swarm.id.0);
                tokio::spawn(async move {
                    loop {
                        match events.recv().await {
                            Ok(SwarmEvent::BestSolutionImproved { iteration, fitness, .. }) => {
                                println!("  {:>6}  {}", iteration, fitness);
                            }
                            Ok(SwarmEvent::SwarmFinished { .. }) | Err(EventBusError::Closed) => break,
                            Ok(_) | Err(_) => {}
                        }
                    }
                })
            });

            node.swarms.start_swarm(swarm.id).await?;
            let finished = tokio::select! {
                result = node.swarms.wait_for_completion(swarm.id) => result?,
                _ = tokio::signal::ctrl_c() => {
                    println!("{}", "Interrupted, stopping swarm".yellow());
                    node.swarms.stop_swarm(swarm.id).await?;
                    node.swarms.get_swarm(swarm.id).await.context("Swarm vanished")?
                }
            };
            if let Some(printer) = printer {
                let _ = printer.await;
            }
            node.shutdown().await;

            match finished.status() {
                SwarmStatus::Completed => println!("{}", "✓ Swarm completed".green()),
                SwarmStatus::Error => {
                    anyhow::bail!(
                        "Swarm failed: {}",
                        finished.last_error.as_deref().unwrap_or("unknown error")
                    );
                }
                status => println!("{}", format!("Swarm {}", status).yellow()),
            }
            println!("  Iterations: {}", finished.current_iteration);
            match finished.best_solution() {
                Some(best) => {
                    println!("  Best fitness: {}", best.fitness.scalar().to_string().bold());
                    println!("  Position: {:?}", best.position);
                }
                None => println!("  Best fitness: {}", "(none)".dimmed()),
            }
            Ok(())
        }
    }
}

/// Parse `LOW:HIGH` into a bounds pair
pub fn parse_bounds(s: &str) -> Result<(f64, f64), String> {
    let (low, high) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LOW:HIGH, got '{}'", s))?;
    let low: f64 = low.trim().parse().map_err(|e| format!("invalid lower bound: {}", e))?;
    let high: f64 = high.trim().parse().map_err(|e| format!("invalid upper bound: {}", e))?;
    match low.partial_cmp(&high) {
        Some(std::cmp::Ordering::Less) => Ok((low, high)),
        _ => Err(format!("lower bound {} must be below upper bound {}", low, high)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_bounds("-5:5"), Ok((-5.0, 5.0)));
        assert_eq!(parse_bounds(" 0.5 : 2 "), Ok((0.5, 2.0)));
        assert!(parse_bounds("5:-5").is_err());
        assert!(parse_bounds("3:3").is_err());
        assert!(parse_bounds("abc").is_err());
        assert!(parse_bounds("1:x").is_err());
    }
}
