//! Per-phase frame timing.
//!
//! The driver stamps each operation as the frame proceeds; costs are kept
//! as rolling averages so a solver change shows up within a second of
//! simulation. Owned by the simulator and read on demand, nothing global.

use std::collections::VecDeque;
use std::time::Instant;

/// One timed phase of the frame, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    ApplyImpulse,
    ComputeDivergence,
    SolvePressure,
    RectifyVelocity,
    AdvectTemperature,
    AdvectDensity,
    AdvectVelocity,
    RestoreVorticity,
    ApplyBuoyancy,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::ApplyImpulse,
        Operation::ComputeDivergence,
        Operation::SolvePressure,
        Operation::RectifyVelocity,
        Operation::AdvectTemperature,
        Operation::AdvectDensity,
        Operation::AdvectVelocity,
        Operation::RestoreVorticity,
        Operation::ApplyBuoyancy,
    ];

    fn index(self) -> usize {
        Operation::ALL.iter().position(|op| *op == self).unwrap()
    }
}

const NUM_SAMPLES: usize = 20;
const MAX_FRAME_STAMPS: usize = 500;

/// Rolling average over the last `capacity` samples.
#[derive(Clone, Debug)]
pub struct RollingAverage {
    values: VecDeque<f32>,
    capacity: usize,
}

impl RollingAverage {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f32>() / self.values.len() as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rolling per-operation costs plus a frame-rate window.
pub struct FrameMetrics {
    costs: Vec<RollingAverage>,
    last_stamp: Option<Instant>,
    frame_stamps: VecDeque<Instant>,
}

impl FrameMetrics {
    pub fn new() -> Self {
        Self {
            costs: Operation::ALL
                .iter()
                .map(|_| RollingAverage::new(NUM_SAMPLES))
                .collect(),
            last_stamp: None,
            frame_stamps: VecDeque::with_capacity(MAX_FRAME_STAMPS),
        }
    }

    /// Start timing a frame.
    pub fn on_frame_begins(&mut self) {
        self.last_stamp = Some(Instant::now());
    }

    /// Record the time since the previous stamp against `op`.
    pub fn on_operation(&mut self, op: Operation) {
        let now = Instant::now();
        if let Some(last) = self.last_stamp {
            let micros = now.duration_since(last).as_secs_f32() * 1e6;
            self.costs[op.index()].push(micros);
        }
        self.last_stamp = Some(now);
    }

    /// Close out the frame for the frame-rate window.
    pub fn on_frame_ends(&mut self) {
        if self.frame_stamps.len() >= MAX_FRAME_STAMPS {
            self.frame_stamps.pop_front();
        }
        self.frame_stamps.push_back(Instant::now());
        self.last_stamp = None;
    }

    /// Rolling average cost of one operation, in microseconds.
    pub fn average_cost(&self, op: Operation) -> f32 {
        self.costs[op.index()].average()
    }

    /// Frames per second over the stamp window.
    pub fn frame_rate(&self) -> f32 {
        match (self.frame_stamps.front(), self.frame_stamps.back()) {
            (Some(first), Some(last)) if self.frame_stamps.len() > 1 => {
                let span = last.duration_since(*first).as_secs_f32();
                if span > 0.0 {
                    (self.frame_stamps.len() - 1) as f32 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    pub fn reset(&mut self) {
        for cost in &mut self.costs {
            *cost = RollingAverage::new(NUM_SAMPLES);
        }
        self.last_stamp = None;
        self.frame_stamps.clear();
    }
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average_window() {
        let mut avg = RollingAverage::new(3);
        assert_eq!(avg.average(), 0.0);
        avg.push(1.0);
        avg.push(2.0);
        avg.push(3.0);
        avg.push(10.0); // evicts the 1.0
        assert!((avg.average() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_operation_costs_accumulate() {
        let mut metrics = FrameMetrics::new();
        metrics.on_frame_begins();
        metrics.on_operation(Operation::SolvePressure);
        metrics.on_frame_ends();

        assert!(metrics.average_cost(Operation::SolvePressure) >= 0.0);
        assert!(!metrics.costs[Operation::SolvePressure.index()].is_empty());
        assert_eq!(metrics.average_cost(Operation::ApplyImpulse), 0.0);
    }

    #[test]
    fn test_frame_rate_needs_two_frames() {
        let mut metrics = FrameMetrics::new();
        assert_eq!(metrics.frame_rate(), 0.0);
        metrics.on_frame_ends();
        assert_eq!(metrics.frame_rate(), 0.0);
        metrics.on_frame_ends();
        // Two stamps nanoseconds apart still yield a finite rate.
        assert!(metrics.frame_rate() >= 0.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut metrics = FrameMetrics::new();
        metrics.on_frame_begins();
        metrics.on_operation(Operation::AdvectDensity);
        metrics.on_frame_ends();
        metrics.reset();
        assert_eq!(metrics.average_cost(Operation::AdvectDensity), 0.0);
        assert_eq!(metrics.frame_rate(), 0.0);
    }
}
