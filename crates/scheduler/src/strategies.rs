use chrono::{DateTime, Duration, Utc};
use feasibility::{combined_maneuver_time_s, AttitudeReference, ScheduledOpportunity, MIN_GAP_SECONDS};
use opportunities::Opportunity;
use planner_support::CancellationToken;

use crate::{RejectedOpportunity, SchedulerConfig, SchedulerError};

type StrategyResult = crate::Result<(Vec<ScheduledOpportunity>, Vec<RejectedOpportunity>)>;

fn reference_after(schedule: &[ScheduledOpportunity], horizon_start: DateTime<Utc>) -> AttitudeReference {
    match schedule.last() {
        Some(last) => AttitudeReference::from_scheduled(last),
        None => AttitudeReference::nadir(horizon_start),
    }
}

fn check_cancelled(token: &CancellationToken) -> crate::Result<()> {
    if token.is_cancelled() {
        return Err(SchedulerError::Cancelled);
    }
    Ok(())
}

/// Sort by `start` ascending, breaking ties by (value descending,
/// target_id ascending) for determinism (spec §5).
pub(crate) fn first_fit(
    opportunities: &[Opportunity],
    horizon_start: DateTime<Utc>,
    config: &SchedulerConfig,
    token: &CancellationToken,
) -> StrategyResult {
    let mut sorted: Vec<&Opportunity> = opportunities.iter().collect();
    sorted.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.target_id.cmp(&b.target_id))
    });

    let mut schedule = Vec::new();
    let mut rejected = Vec::new();

    for candidate in sorted {
        check_cancelled(token)?;
        let reference = reference_after(&schedule, horizon_start);
        match feasibility::evaluate(
            &reference,
            candidate,
            &config.limits,
            config.max_spacecraft_roll_deg,
            config.max_spacecraft_pitch_deg,
            config.allowable_window_slip_s,
        ) {
            Ok(scheduled) => schedule.push(scheduled),
            Err(reason) => rejected.push(RejectedOpportunity {
                opportunity: candidate.clone(),
                reason,
            }),
        }
    }

    Ok((schedule, rejected))
}

/// Repeatedly picks the highest-value feasible candidate whose `start`
/// is at or after the last accepted task's gap threshold, tie-breaking
/// on the smallest attitude change. O(n^2) worst case.
pub(crate) fn best_fit(
    opportunities: &[Opportunity],
    horizon_start: DateTime<Utc>,
    config: &SchedulerConfig,
    token: &CancellationToken,
) -> StrategyResult {
    let mut remaining: Vec<&Opportunity> = opportunities.iter().collect();
    let mut schedule: Vec<ScheduledOpportunity> = Vec::new();

    loop {
        check_cancelled(token)?;
        let reference = reference_after(&schedule, horizon_start);
        let threshold = reference.end + Duration::seconds(MIN_GAP_SECONDS as i64);

        let mut candidates: Vec<&Opportunity> = remaining
            .iter()
            .filter(|o| o.start >= threshold)
            .copied()
            .collect();
        candidates.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let delta_a = (a.roll_angle_deg - reference.roll_deg).abs();
                    let delta_b = (b.roll_angle_deg - reference.roll_deg).abs();
                    delta_a.partial_cmp(&delta_b).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.target_id.cmp(&b.target_id))
        });

        let mut accepted_this_round = None;
        for candidate in &candidates {
            if let Ok(scheduled) = feasibility::evaluate(
                &reference,
                candidate,
                &config.limits,
                config.max_spacecraft_roll_deg,
                config.max_spacecraft_pitch_deg,
                config.allowable_window_slip_s,
            ) {
                accepted_this_round = Some((candidate.id.clone(), scheduled));
                break;
            }
        }

        match accepted_this_round {
            Some((accepted_id, scheduled)) => {
                schedule.push(scheduled);
                remaining.retain(|o| o.id != accepted_id);
            }
            None => break,
        }
    }

    let mut rejected = Vec::with_capacity(remaining.len());
    let final_reference = reference_after(&schedule, horizon_start);
    for candidate in remaining {
        let reason = feasibility::evaluate(
            &final_reference,
            candidate,
            &config.limits,
            config.max_spacecraft_roll_deg,
            config.max_spacecraft_pitch_deg,
            config.allowable_window_slip_s,
        )
        .err()
        .unwrap_or(feasibility::RejectionReason::ManeuverExceedsGap {
            maneuver_s: 0.0,
            gap_s: 0.0,
        });
        rejected.push(RejectedOpportunity {
            opportunity: candidate.clone(),
            reason,
        });
    }

    Ok((schedule, rejected))
}

fn density_key(opportunity: &Opportunity, config: &SchedulerConfig) -> f64 {
    let expected_maneuver = combined_maneuver_time_s(
        opportunity.roll_angle_deg.abs(),
        opportunity.pitch_angle_deg.abs(),
        &config.limits,
    );
    opportunity.value / (opportunity.duration_s + expected_maneuver).max(1e-9)
}

fn provisional_interval(
    opportunity: &Opportunity,
    config: &SchedulerConfig,
) -> (DateTime<Utc>, DateTime<Utc>) {
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

/// Sorts by value density (`value / (imaging_time + expected_maneuver)`)
/// descending and greedily accepts non-conflicting candidates, then
/// re-walks the accepted set in chronological order through the
/// feasibility kernel to realize actual maneuver chaining (the density
/// pass only checks interval overlap, per spec §4.5.3; the chronological
/// re-walk is what gives every accepted task a real `ScheduledOpportunity`
/// and upholds the chronological invariant of spec §8 property 6).
pub(crate) fn value_density(
    opportunities: &[Opportunity],
    horizon_start: DateTime<Utc>,
    config: &SchedulerConfig,
    token: &CancellationToken,
) -> StrategyResult {
    let mut sorted: Vec<&Opportunity> = opportunities.iter().collect();
    sorted.sort_by(|a, b| {
        density_key(b, config)
            .partial_cmp(&density_key(a, config))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.target_id.cmp(&b.target_id))
    });

    let mut staged: Vec<&Opportunity> = Vec::new();
    let mut staged_intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    let mut density_rejected: Vec<&Opportunity> = Vec::new();

    for candidate in sorted {
        check_cancelled(token)?;
        let interval = provisional_interval(candidate, config);
        if staged_intervals.iter().any(|existing| intervals_overlap(*existing, interval)) {
            density_rejected.push(candidate);
            continue;
        }
        staged_intervals.push(interval);
        staged.push(candidate);
    }

    staged.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.target_id.cmp(&b.target_id)));

    let mut schedule = Vec::new();
    let mut rejected = Vec::new();

    for candidate in staged {
        check_cancelled(token)?;
        let reference = reference_after(&schedule, horizon_start);
        match feasibility::evaluate(
            &reference,
            candidate,
            &config.limits,
            config.max_spacecraft_roll_deg,
            config.max_spacecraft_pitch_deg,
            config.allowable_window_slip_s,
        ) {
            Ok(scheduled) => schedule.push(scheduled),
            Err(reason) => rejected.push(RejectedOpportunity {
                opportunity: candidate.clone(),
                reason,
            }),
        }
    }

    for candidate in density_rejected {
        rejected.push(RejectedOpportunity {
            opportunity: candidate.clone(),
            reason: feasibility::RejectionReason::ManeuverExceedsGap {
                maneuver_s: combined_maneuver_time_s(
                    candidate.roll_angle_deg.abs(),
                    candidate.pitch_angle_deg.abs(),
                    &config.limits,
                ),
                gap_s: 0.0,
            },
        });
    }

    Ok((schedule, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use feasibility::SpacecraftLimits;

    fn horizon_start() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn opp(id: &str, start_offset_s: i64, roll_deg: f64, value: f64, target_id: &str) -> Opportunity {
        let start = horizon_start() + Duration::seconds(start_offset_s);
        Opportunity {
            id: id.into(),
            satellite_id: "sat-1".into(),
            target_id: target_id.into(),
            start,
            end: start + Duration::seconds(5),
            duration_s: 5.0,
            value,
            priority: 1,
            incidence_angle_deg: 10.0,
            roll_angle_deg: roll_deg,
            pitch_angle_deg: 0.0,
            parent_pass_index: 0,
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            max_spacecraft_roll_deg: 45.0,
            max_spacecraft_pitch_deg: 45.0,
            limits: SpacecraftLimits::new(2.0, 1.0, 2.0, 1.0).unwrap(),
            allowable_window_slip_s: 0.0,
        }
    }

    #[test]
    fn first_fit_accepts_well_spaced_opportunities_in_start_order() {
        let opportunities = vec![
            opp("a", 0, 0.0, 5.0, "t-a"),
            opp("b", 200, 0.0, 5.0, "t-b"),
            opp("c", 400, 0.0, 5.0, "t-c"),
        ];
        let (schedule, rejected) =
            first_fit(&opportunities, horizon_start(), &config(), &CancellationToken::new()).unwrap();
        assert_eq!(schedule.len(), 3);
        assert!(rejected.is_empty());
        for window in schedule.windows(2) {
            assert!(window[0].opportunity.start <= window[1].opportunity.start);
        }
    }

    #[test]
    fn first_fit_rejects_opportunity_whose_gap_is_too_short() {
        let opportunities = vec![
            opp("a", 0, 0.0, 5.0, "t-a"),
            // Starts 7s after "a" ends (t=5s); can't clear MIN_GAP_SECONDS (10s).
            opp("b", 12, 0.0, 5.0, "t-b"),
        ];
        let (schedule, rejected) =
            first_fit(&opportunities, horizon_start(), &config(), &CancellationToken::new()).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].opportunity.id, "b");
    }

    #[test]
    fn first_fit_is_deterministic_under_start_ties() {
        // Same start, different value: spec §5 says ties break by (value
        // desc, target_id) - the higher-value one should be considered
        // (and accepted) first.
        let opportunities = vec![
            opp("low", 0, 0.0, 1.0, "t-low"),
            opp("high", 0, 0.0, 9.0, "t-high"),
        ];
        let (schedule, _) =
            first_fit(&opportunities, horizon_start(), &config(), &CancellationToken::new()).unwrap();
        assert_eq!(schedule[0].opportunity.id, "high");
    }

    #[test]
    fn best_fit_prefers_higher_value_over_earlier_start() {
        // Both candidates clear the gap; best-fit should take the
        // higher-value one even though it starts later.
        let opportunities = vec![
            opp("cheap", 50, 0.0, 1.0, "t-cheap"),
            opp("rich", 300, 0.0, 20.0, "t-rich"),
        ];
        let (schedule, _) =
            best_fit(&opportunities, horizon_start(), &config(), &CancellationToken::new()).unwrap();
        assert_eq!(schedule[0].opportunity.id, "rich");
    }

    #[test]
    fn best_fit_schedules_at_least_as_many_as_first_fit_same_input() {
        let opportunities = vec![
            opp("a", 0, 0.0, 5.0, "t-a"),
            opp("b", 20, 0.0, 9.0, "t-b"),
            opp("c", 400, 0.0, 3.0, "t-c"),
        ];
        let (first, _) =
            first_fit(&opportunities, horizon_start(), &config(), &CancellationToken::new()).unwrap();
        let (best, _) =
            best_fit(&opportunities, horizon_start(), &config(), &CancellationToken::new()).unwrap();
        assert!(best.len() >= first.len());
    }

    #[test]
    fn value_density_rejects_temporally_overlapping_candidate() {
        let opportunities = vec![
            opp("a", 0, 0.0, 5.0, "t-a"),
            // Overlaps "a"'s provisional interval outright.
            opp("b", 2, 0.0, 1.0, "t-b"),
        ];
        let (schedule, rejected) =
            value_density(&opportunities, horizon_start(), &config(), &CancellationToken::new()).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].opportunity.id, "a");
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn all_strategies_respect_roll_limit() {
        let opportunities = vec![opp("over-limit", 0, 80.0, 5.0, "t-a")];
        for strategy_fn in [first_fit, best_fit, value_density] {
            let (schedule, rejected) = strategy_fn(
                &opportunities,
                horizon_start(),
                &config(),
                &CancellationToken::new(),
            )
            .unwrap();
            assert!(schedule.is_empty());
            assert_eq!(rejected.len(), 1);
        }
    }
}
