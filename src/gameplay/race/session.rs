use crate::config::PhysicsConfig;
use crate::gameplay::contact::resolve_car_contact;
use crate::gameplay::laps::LapZones;
use crate::gameplay::vehicle::{StepReport, TickInput, Vehicle};
use crate::track::surface::CollisionSurface;
use std::time::Duration;

pub const RACER_COUNT: usize = 2;
const COUNTDOWN_STAGES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    Countdown,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStage {
    Lights(u8),
    Go,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceOutcome {
    pub winner: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub started: bool,
    pub steps: [StepReport; RACER_COUNT],
    pub contact: bool,
    pub finished: Option<RaceOutcome>,
}

/// One race between two cars: countdown, racing, then a terminal finish.
#[derive(Debug, Clone)]
pub struct RaceSession {
    vehicles: [Vehicle; RACER_COUNT],
    clock: Duration,
    countdown: Duration,
    started_at: Option<Duration>,
    outcome: Option<RaceOutcome>,
    total_laps: u32,
    saved: bool,
}

impl RaceSession {
    pub fn new(vehicles: [Vehicle; RACER_COUNT], countdown: Duration, total_laps: u32) -> Self {
        Self {
            vehicles,
            clock: Duration::ZERO,
            countdown,
            started_at: None,
            outcome: None,
            total_laps,
            saved: false,
        }
    }

    pub fn vehicles(&self) -> &[Vehicle; RACER_COUNT] {
        &self.vehicles
    }

    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    pub fn phase(&self) -> RacePhase {
        if self.outcome.is_some() {
            RacePhase::Finished
        } else if self.started_at.is_some() {
            RacePhase::Active
        } else {
            RacePhase::Countdown
        }
    }

    /// Three lights one quarter of the countdown apart, then "go" for the last quarter.
    pub fn countdown_stage(&self) -> CountdownStage {
        let stage = self.countdown / COUNTDOWN_STAGES;
        if stage.is_zero() || self.clock >= self.countdown {
            return CountdownStage::Hidden;
        }
        match (self.clock.as_nanos() / stage.as_nanos()) as u32 {
            lit @ 0..=2 => CountdownStage::Lights(lit as u8 + 1),
            _ => CountdownStage::Go,
        }
    }

    /// Time since the lights went out; frozen once the race is won.
    pub fn race_time(&self) -> Duration {
        match (self.outcome, self.started_at) {
            (Some(outcome), _) => outcome.elapsed,
            (None, Some(started_at)) => self.clock.saturating_sub(started_at),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn outcome(&self) -> Option<RaceOutcome> {
        self.outcome
    }

    /// Yields the outcome the first time it is asked for after the finish.
    pub fn take_unsaved_outcome(&mut self) -> Option<RaceOutcome> {
        if self.saved {
            return None;
        }
        let outcome = self.outcome?;
        self.saved = true;
        Some(outcome)
    }

    pub fn tick(
        &mut self,
        dt: Duration,
        inputs: [TickInput; RACER_COUNT],
        surface: &CollisionSurface,
        zones: &LapZones,
        physics: &PhysicsConfig,
    ) -> TickReport {
        self.clock += dt;
        let mut report = TickReport::default();

        match self.phase() {
            RacePhase::Countdown => {
                if self.clock < self.countdown {
                    return report;
                }
                self.started_at = Some(self.clock);
                report.started = true;
            }
            RacePhase::Finished => {
                for vehicle in &mut self.vehicles {
                    vehicle.step(TickInput::IDLE, surface, zones, physics);
                }
                return report;
            }
            RacePhase::Active => {}
        }

        let [first, second] = &mut self.vehicles;
        report.steps[0] = first.step(inputs[0], surface, zones, physics);
        report.steps[1] = second.step(inputs[1], surface, zones, physics);
        report.contact = resolve_car_contact(first, second, physics);

        // Slot order decides a same-tick finish.
        let total_laps = self.total_laps;
        if let Some(winner) = self
            .vehicles
            .iter()
            .position(|vehicle| vehicle.lap() > total_laps)
        {
            let outcome = RaceOutcome {
                winner,
                elapsed: self.race_time(),
            };
            self.outcome = Some(outcome);
            for vehicle in &mut self.vehicles {
                vehicle.finish();
            }
            report.finished = Some(outcome);
        }

        report
    }
}

pub fn format_lap_time(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    format!(
        "{:02}:{:02}:{:02}",
        millis / 60_000,
        (millis / 1_000) % 60,
        (millis % 1_000) / 10
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::vehicle::dynamics::tests::test_stats;
    use bevy::math::{Rect, Vec2};

    const START: Vec2 = Vec2::new(200.0, 200.0);
    const CHECKPOINT: Vec2 = Vec2::new(1_500.0, 1_500.0);
    const TICK: Duration = Duration::from_millis(16);

    fn zones() -> LapZones {
        LapZones {
            start: Rect::from_center_size(START, Vec2::splat(400.0)),
            checkpoint: Rect::from_center_size(CHECKPOINT, Vec2::splat(600.0)),
        }
    }

    fn session() -> RaceSession {
        RaceSession::new(
            [
                Vehicle::new(test_stats(), START, 0.0, 1),
                Vehicle::new(test_stats(), Vec2::new(900.0, 200.0), 0.0, 2),
            ],
            Duration::from_millis(4_000),
            3,
        )
    }

    fn full_throttle() -> [TickInput; RACER_COUNT] {
        [TickInput {
            throttle: 1.0,
            ..TickInput::IDLE
        }; RACER_COUNT]
    }

    fn drive_lap(race: &mut RaceSession, slot: usize, surface: &CollisionSurface) -> TickReport {
        let physics = PhysicsConfig::default();
        race.vehicles[slot].position = CHECKPOINT;
        race.tick(TICK, [TickInput::IDLE; RACER_COUNT], surface, &zones(), &physics);
        race.vehicles[slot].position = START;
        race.tick(TICK, [TickInput::IDLE; RACER_COUNT], surface, &zones(), &physics)
    }

    fn start_race(race: &mut RaceSession, surface: &CollisionSurface) {
        let physics = PhysicsConfig::default();
        race.tick(
            Duration::from_millis(4_000),
            [TickInput::IDLE; RACER_COUNT],
            surface,
            &zones(),
            &physics,
        );
        assert_eq!(race.phase(), RacePhase::Active);
    }

    #[test]
    fn countdown_shows_lights_and_freezes_cars() {
        let surface = CollisionSurface::open(2_000, 2_000);
        let physics = PhysicsConfig::default();
        let mut race = session();
        let step = Duration::from_millis(500);

        let mut stages = Vec::new();
        for _ in 0..7 {
            let report = race.tick(step, full_throttle(), &surface, &zones(), &physics);
            assert!(!report.started);
            stages.push(race.countdown_stage());
        }

        assert_eq!(
            stages,
            vec![
                CountdownStage::Lights(1),
                CountdownStage::Lights(2),
                CountdownStage::Lights(2),
                CountdownStage::Lights(3),
                CountdownStage::Lights(3),
                CountdownStage::Go,
                CountdownStage::Go,
            ]
        );
        assert_eq!(race.phase(), RacePhase::Countdown);
        assert_eq!(race.vehicles()[0].position, START);
        assert_eq!(race.vehicles()[0].velocity, Vec2::ZERO);
        assert_eq!(race.race_time(), Duration::ZERO);

        let report = race.tick(step, full_throttle(), &surface, &zones(), &physics);
        assert!(report.started);
        assert_eq!(race.phase(), RacePhase::Active);
        assert_eq!(race.countdown_stage(), CountdownStage::Hidden);
        assert!(race.vehicles()[0].speed() > 0.0);
    }

    #[test]
    fn third_completed_lap_finishes_the_race() {
        let surface = CollisionSurface::open(2_000, 2_000);
        let mut race = session();
        start_race(&mut race, &surface);

        for lap in 1..=2 {
            let report = drive_lap(&mut race, 0, &surface);
            assert!(report.steps[0].laps.lap_completed, "lap {lap}");
            assert_eq!(race.phase(), RacePhase::Active);
        }
        let report = drive_lap(&mut race, 0, &surface);

        let outcome = report.finished.expect("race should finish");
        assert_eq!(outcome.winner, 0);
        assert_eq!(outcome.elapsed, TICK * 6);
        assert_eq!(race.phase(), RacePhase::Finished);
        assert!(race.vehicles().iter().all(|vehicle| vehicle.finished));
        assert_eq!(race.vehicles()[0].lap(), 4);
    }

    #[test]
    fn second_car_can_win() {
        let surface = CollisionSurface::open(2_000, 2_000);
        let mut race = session();
        start_race(&mut race, &surface);
        race.vehicles[0].position = Vec2::new(900.0, 900.0);

        for _ in 0..3 {
            drive_lap(&mut race, 1, &surface);
        }

        assert_eq!(race.outcome().map(|outcome| outcome.winner), Some(1));
    }

    #[test]
    fn first_slot_wins_a_same_tick_finish() {
        let surface = CollisionSurface::open(2_000, 2_000);
        let physics = PhysicsConfig::default();
        let mut race = session();
        start_race(&mut race, &surface);
        for vehicle in &mut race.vehicles {
            vehicle.progress.lap = 3;
            vehicle.progress.checkpoint_passed = true;
        }
        race.vehicles[0].position = START;
        race.vehicles[1].position = START + Vec2::new(100.0, 100.0);

        let report = race.tick(TICK, [TickInput::IDLE; RACER_COUNT], &surface, &zones(), &physics);

        assert_eq!(report.finished.map(|outcome| outcome.winner), Some(0));
    }

    #[test]
    fn finished_race_freezes_clock_and_coasts_cars() {
        let surface = CollisionSurface::open(2_000, 2_000);
        let physics = PhysicsConfig::default();
        let mut race = session();
        start_race(&mut race, &surface);
        for _ in 0..3 {
            drive_lap(&mut race, 0, &surface);
        }
        race.vehicles[1].velocity = Vec2::new(10.0, 0.0);
        let finished_at = race.race_time();

        race.tick(TICK, full_throttle(), &surface, &zones(), &physics);

        assert_eq!(race.race_time(), finished_at);
        assert!((race.vehicles()[1].velocity.x - 9.5).abs() < 1e-4);
        assert_eq!(race.phase(), RacePhase::Finished);
    }

    #[test]
    fn outcome_is_handed_out_once() {
        let surface = CollisionSurface::open(2_000, 2_000);
        let mut race = session();
        assert_eq!(race.take_unsaved_outcome(), None);

        start_race(&mut race, &surface);
        for _ in 0..3 {
            drive_lap(&mut race, 0, &surface);
        }

        assert!(race.take_unsaved_outcome().is_some());
        assert_eq!(race.take_unsaved_outcome(), None);
    }

    #[test]
    fn lap_time_formats_minutes_seconds_centiseconds() {
        assert_eq!(format_lap_time(Duration::from_millis(83_456)), "01:23:45");
        assert_eq!(format_lap_time(Duration::from_millis(5)), "00:00:00");
        assert_eq!(format_lap_time(Duration::from_millis(600_010)), "10:00:01");
    }
}
