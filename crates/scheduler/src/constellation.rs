use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use feasibility::{combined_maneuver_time_s, AttitudeReference, ScheduledOpportunity, MIN_GAP_SECONDS};
use opportunities::Opportunity;
use planner_support::CancellationToken;
use serde::{Deserialize, Serialize};

use crate::{SchedulerConfig, SchedulerError};

const SWAP_REPAIR_ITERATION_CAP: usize = 50;

/// Which scheduled opportunity a target keeps when more than one
/// satellite has it scheduled (spec §4.5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SingletonPolicy {
    #[default]
    BestGeometry,
    FirstAvailable,
    HighestValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DisplacedReason {
    /// Lost the singleton tie-break to another satellite's scheduling of
    /// the same target.
    SingletonLoser { target_id: String, kept_satellite_id: String },
    /// Removed to make room for a coverage-repair swap.
    SwapRepair { target_id: String },
}

#[derive(Debug, Clone)]
pub struct DisplacedOpportunity {
    pub scheduled: ScheduledOpportunity,
    pub reason: DisplacedReason,
}

/// One accepted coverage-repair swap (spec §4.5.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
    pub target_id: String,
    pub freed_satellite_id: String,
    pub blocking_opportunity_id: String,
    pub blocking_target_id: String,
    pub replacement_satellite_id: String,
    pub replacement_opportunity_id: String,
}

#[derive(Debug, Clone)]
pub struct ConstellationResult {
    pub schedule: Vec<ScheduledOpportunity>,
    pub displaced: Vec<DisplacedOpportunity>,
    pub swaps: Vec<SwapRecord>,
}

fn blocking_interval(opportunity: &Opportunity, config: &SchedulerConfig) -> (DateTime<Utc>, DateTime<Utc>) {
    let expected_maneuver = combined_maneuver_time_s(
        opportunity.roll_angle_deg.abs(),
        opportunity.pitch_angle_deg.abs(),
        &config.limits,
    );
    let start = opportunity.start - Duration::milliseconds((expected_maneuver * 1000.0) as i64);
    let end = opportunity.end + Duration::seconds(MIN_GAP_SECONDS as i64);
    (start, end)
}

fn intervals_overlap(a: (DateTime<Utc>, DateTime<Utc>), b: (DateTime<Utc>, DateTime<Utc>)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Re-derives a chronologically-ordered, fully-chained schedule for one
/// satellite from a candidate opportunity set, or `None` if one of them
/// cannot be placed (maneuver chaining makes it infeasible).
fn rebuild_chain(
    horizon_start: DateTime<Utc>,
    mut candidates: Vec<Opportunity>,
    config: &SchedulerConfig,
) -> Option<Vec<ScheduledOpportunity>> {
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.target_id.cmp(&b.target_id)));
    let mut schedule = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let reference = match schedule.last() {
            Some(last) => AttitudeReference::from_scheduled(last),
            None => AttitudeReference::nadir(horizon_start),
        };
        let scheduled = feasibility::evaluate(
            &reference,
            &candidate,
            &config.limits,
            config.max_spacecraft_roll_deg,
            config.max_spacecraft_pitch_deg,
            config.allowable_window_slip_s,
        )
        .ok()?;
        schedule.push(scheduled);
    }
    Some(schedule)
}

fn highest_value<'a>(candidates: impl Iterator<Item = &'a Opportunity>) -> Option<&'a Opportunity> {
    candidates.max_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal))
}

/// Groups every satellite's scheduled opportunities by `target_id` and,
/// for any target scheduled on more than one satellite, keeps exactly one
/// according to `policy`. Applies coverage-improvement swap repair
/// afterward.
pub fn resolve_constellation(
    per_satellite_schedules: HashMap<String, Vec<ScheduledOpportunity>>,
    candidates_by_satellite: &HashMap<String, Vec<Opportunity>>,
    horizon_start: DateTime<Utc>,
    config: &SchedulerConfig,
    policy: SingletonPolicy,
    token: &CancellationToken,
) -> crate::Result<ConstellationResult> {
    let mut schedules = per_satellite_schedules;
    let mut displaced = Vec::new();

    // --- Singleton resolution ---
    let mut by_target: HashMap<String, Vec<(String, usize)>> = HashMap::new();
    for (satellite_id, schedule) in &schedules {
        for (index, scheduled) in schedule.iter().enumerate() {
            by_target
                .entry(scheduled.opportunity.target_id.clone())
                .or_default()
                .push((satellite_id.clone(), index));
        }
    }

    let mut to_remove: HashMap<String, Vec<usize>> = HashMap::new();
    for (target_id, mut locations) in by_target {
        if locations.len() <= 1 {
            continue;
        }
        locations.sort_by(|a, b| a.0.cmp(&b.0));
        let winner = match policy {
            SingletonPolicy::BestGeometry => locations
                .iter()
                .min_by(|a, b| {
                    let inc_a = schedules[&a.0][a.1].opportunity.incidence_angle_deg;
                    let inc_b = schedules[&b.0][b.1].opportunity.incidence_angle_deg;
                    inc_a.partial_cmp(&inc_b).unwrap_or(std::cmp::Ordering::Equal)
                })
                .cloned()
                .unwrap(),
            SingletonPolicy::FirstAvailable => locations
                .iter()
                .min_by_key(|(sat, idx)| schedules[sat][*idx].opportunity.start)
                .cloned()
                .unwrap(),
            SingletonPolicy::HighestValue => locations
                .iter()
                .max_by(|a, b| {
                    let val_a = schedules[&a.0][a.1].opportunity.value;
                    let val_b = schedules[&b.0][b.1].opportunity.value;
                    val_a.partial_cmp(&val_b).unwrap_or(std::cmp::Ordering::Equal)
                })
                .cloned()
                .unwrap(),
        };

        for location in &locations {
            if *location != winner {
                to_remove.entry(location.0.clone()).or_default().push(location.1);
                let scheduled = schedules[&location.0][location.1].clone();
                displaced.push(DisplacedOpportunity {
                    scheduled,
                    reason: DisplacedReason::SingletonLoser {
                        target_id: target_id.clone(),
                        kept_satellite_id: winner.0.clone(),
                    },
                });
            }
        }
    }

    for (satellite_id, mut indices) in to_remove {
        indices.sort_unstable_by(|a, b| b.cmp(a));
        if let Some(schedule) = schedules.get_mut(&satellite_id) {
            for index in indices {
                schedule.remove(index);
            }
        }
    }

    // --- Coverage-improvement swap repair ---
    let mut swaps = Vec::new();
    let covered_targets: std::collections::HashSet<String> = schedules
        .values()
        .flat_map(|schedule| schedule.iter().map(|s| s.opportunity.target_id.clone()))
        .collect();
    let all_targets: std::collections::HashSet<String> = candidates_by_satellite
        .values()
        .flat_map(|opps| opps.iter().map(|o| o.target_id.clone()))
        .collect();
    let mut uncovered: Vec<String> = all_targets.difference(&covered_targets).cloned().collect();
    uncovered.sort();

    let mut iterations = 0;
    'repair: while iterations < SWAP_REPAIR_ITERATION_CAP && !uncovered.is_empty() {
        if token.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }
        iterations += 1;
        let mut made_progress = false;

        for target_id in uncovered.clone() {
            let mut satellite_ids: Vec<&String> = candidates_by_satellite.keys().collect();
            satellite_ids.sort();

            for satellite_id in satellite_ids {
                let candidates_here = &candidates_by_satellite[satellite_id];
                let o_u = match highest_value(
                    candidates_here.iter().filter(|o| o.target_id == target_id),
                ) {
                    Some(o) => o.clone(),
                    None => continue,
                };

                let current_schedule = schedules.get(satellite_id).cloned().unwrap_or_default();
                let probe = blocking_interval(&o_u, config);
                let blocking: Vec<ScheduledOpportunity> = current_schedule
                    .iter()
                    .filter(|s| intervals_overlap(blocking_interval(&s.opportunity, config), probe))
                    .cloned()
                    .collect();

                if blocking.is_empty() {
                    continue;
                }

                // Find an alternative for every blocked task, each on a
                // different satellite, each insertable without
                // displacing that satellite's own covered targets.
                let mut alternatives = Vec::new();
                let mut all_found = true;
                for blocked in &blocking {
                    let mut found = None;
                    let mut other_sats: Vec<&String> = candidates_by_satellite.keys().collect();
                    other_sats.sort();
                    for other_sat in other_sats {
                        if other_sat == satellite_id {
                            continue;
                        }
                        let already_scheduled = schedules
                            .get(other_sat)
                            .map(|s| s.iter().any(|x| x.opportunity.target_id == blocked.opportunity.target_id))
                            .unwrap_or(false);
                        if already_scheduled {
                            continue;
                        }
                        let alt_candidate = candidates_by_satellite[other_sat]
                            .iter()
                            .find(|o| o.target_id == blocked.opportunity.target_id);
                        let alt_candidate = match alt_candidate {
                            Some(c) => c.clone(),
                            None => continue,
                        };
                        let mut trial: Vec<Opportunity> = schedules
                            .get(other_sat)
                            .map(|s| s.iter().map(|x| x.opportunity.clone()).collect())
                            .unwrap_or_default();
                        trial.push(alt_candidate.clone());
                        if rebuild_chain(horizon_start, trial.clone(), config)
                            .map(|chain| chain.len() == trial.len())
                            .unwrap_or(false)
                        {
                            found = Some((other_sat.clone(), alt_candidate));
                            break;
                        }
                    }
                    match found {
                        Some(alt) => alternatives.push((blocked.clone(), alt)),
                        None => {
                            all_found = false;
                            break;
                        }
                    }
                }

                if !all_found {
                    continue;
                }

                // Build the proposed new schedule for `satellite_id`.
                let mut trial_here: Vec<Opportunity> = current_schedule
                    .iter()
                    .filter(|s| !blocking.iter().any(|b| b.opportunity.id == s.opportunity.id))
                    .map(|s| s.opportunity.clone())
                    .collect();
                trial_here.push(o_u.clone());
                let new_here = match rebuild_chain(horizon_start, trial_here.clone(), config) {
                    Some(chain) if chain.len() == trial_here.len() => chain,
                    _ => continue,
                };

                let value_before: f64 = current_schedule.iter().map(|s| s.opportunity.value).sum();
                let value_after_here: f64 = new_here.iter().map(|s| s.opportunity.value).sum();

                let mut alt_chains = Vec::new();
                let mut alt_value_delta = 0.0;
                for (_, (other_sat, alt_candidate)) in &alternatives {
                    let mut trial_other: Vec<Opportunity> = schedules
                        .get(other_sat)
                        .map(|s| s.iter().map(|x| x.opportunity.clone()).collect())
                        .unwrap_or_default();
                    trial_other.push(alt_candidate.clone());
                    let new_other = match rebuild_chain(horizon_start, trial_other.clone(), config) {
                        Some(chain) if chain.len() == trial_other.len() => chain,
                        _ => continue 'repair,
                    };
                    alt_value_delta += alt_candidate.value;
                    alt_chains.push((other_sat.clone(), new_other));
                }

                let total_value_delta = (value_after_here - value_before) + alt_value_delta;
                if total_value_delta <= 0.0 {
                    continue;
                }

                for blocked in &blocking {
                    displaced.push(DisplacedOpportunity {
                        scheduled: blocked.clone(),
                        reason: DisplacedReason::SwapRepair {
                            target_id: target_id.clone(),
                        },
                    });
                }

                for (blocked, (other_sat, alt_candidate)) in blocking.iter().zip(alternatives.iter().map(|(_, a)| a)) {
                    swaps.push(SwapRecord {
                        target_id: target_id.clone(),
                        freed_satellite_id: satellite_id.clone(),
                        blocking_opportunity_id: blocked.opportunity.id.clone(),
                        blocking_target_id: blocked.opportunity.target_id.clone(),
                        replacement_satellite_id: other_sat.clone(),
                        replacement_opportunity_id: alt_candidate.id.clone(),
                    });
                }

                schedules.insert(satellite_id.clone(), new_here);
                for (other_sat, chain) in alt_chains {
                    schedules.insert(other_sat, chain);
                }

                made_progress = true;
                break;
            }

            if made_progress {
                break;
            }
        }

        if !made_progress {
            break;
        }

        let covered_now: std::collections::HashSet<String> = schedules
            .values()
            .flat_map(|schedule| schedule.iter().map(|s| s.opportunity.target_id.clone()))
            .collect();
        uncovered = all_targets.difference(&covered_now).cloned().collect();
        uncovered.sort();
    }

    let mut schedule: Vec<ScheduledOpportunity> = schedules.into_values().flatten().collect();
    schedule.sort_by(|a, b| a.opportunity.start.cmp(&b.opportunity.start));

    Ok(ConstellationResult {
        schedule,
        displaced,
        swaps,
    })
}
