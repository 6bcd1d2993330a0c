use std::time::{Duration, Instant};

use log::{debug, log_enabled, trace, Level};

/// Iteration counters for the distance, shape-cast and time-of-impact
/// queries. Callers own the accumulator and pass it in explicitly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueryStats {
    pub gjk_calls: u32,
    pub gjk_iterations: u32,
    pub gjk_max_iterations: u32,
    pub shape_cast_calls: u32,
    pub shape_cast_iterations: u32,
    pub toi_calls: u32,
    pub toi_iterations: u32,
    pub toi_max_iterations: u32,
    pub toi_root_iterations: u32,
    pub toi_max_root_iterations: u32,
}

impl QueryStats {
    pub fn record_gjk(&mut self, iterations: u32) {
        self.gjk_calls += 1;
        self.gjk_iterations += iterations;
        self.gjk_max_iterations = self.gjk_max_iterations.max(iterations);
    }

    pub fn record_shape_cast(&mut self, iterations: u32) {
        self.shape_cast_calls += 1;
        self.shape_cast_iterations += iterations;
    }

    pub fn record_toi(&mut self, iterations: u32, root_iterations: u32, max_root_iterations: u32) {
        self.toi_calls += 1;
        self.toi_iterations += iterations;
        self.toi_max_iterations = self.toi_max_iterations.max(iterations);
        self.toi_root_iterations += root_iterations;
        self.toi_max_root_iterations = self.toi_max_root_iterations.max(max_root_iterations);
    }

    pub fn merge(&mut self, other: &QueryStats) {
        self.gjk_calls += other.gjk_calls;
        self.gjk_iterations += other.gjk_iterations;
        self.gjk_max_iterations = self.gjk_max_iterations.max(other.gjk_max_iterations);
        self.shape_cast_calls += other.shape_cast_calls;
        self.shape_cast_iterations += other.shape_cast_iterations;
        self.toi_calls += other.toi_calls;
        self.toi_iterations += other.toi_iterations;
        self.toi_max_iterations = self.toi_max_iterations.max(other.toi_max_iterations);
        self.toi_root_iterations += other.toi_root_iterations;
        self.toi_max_root_iterations = self
            .toi_max_root_iterations
            .max(other.toi_max_root_iterations);
    }
}

/// Timings and counters for one world step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfile {
    pub step: Duration,
    pub pairing: Duration,
    pub collide: Duration,
    pub solve: Duration,
    pub solve_init: Duration,
    pub solve_velocity: Duration,
    pub solve_position: Duration,
    pub solve_toi: Duration,

    pub body_count: usize,
    pub contact_count: usize,
    pub touching_count: usize,
    pub toi_events: usize,
    pub queries: QueryStats,
}

impl StepProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Logs a one-step breakdown at debug level.
    pub fn report(&self) {
        if !log_enabled!(Level::Debug) {
            return;
        }
        let ms = |d: Duration| d.as_secs_f32() * 1000.0;
        debug!(
            "step {:.3} ms | pairing {:.3} | collide {:.3} | solve {:.3} (init {:.3}, vel {:.3}, pos {:.3}) | toi {:.3}",
            ms(self.step),
            ms(self.pairing),
            ms(self.collide),
            ms(self.solve),
            ms(self.solve_init),
            ms(self.solve_velocity),
            ms(self.solve_position),
            ms(self.solve_toi),
        );
        debug!(
            "bodies {} contacts {} touching {} toi events {} | gjk {}/{} (max {}) toi {}/{} (max {}, root max {})",
            self.body_count,
            self.contact_count,
            self.touching_count,
            self.toi_events,
            self.queries.gjk_calls,
            self.queries.gjk_iterations,
            self.queries.gjk_max_iterations,
            self.queries.toi_calls,
            self.queries.toi_iterations,
            self.queries.toi_max_iterations,
            self.queries.toi_max_root_iterations,
        );
    }
}

/// Adds the elapsed time of a scope to a duration slot and traces the scope
/// boundaries.
pub struct ScopedTimer<'a> {
    label: &'static str,
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'static str, output: &'a mut Duration) -> Self {
        if log_enabled!(Level::Trace) {
            trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        *self.output += elapsed;
        if log_enabled!(Level::Trace) {
            trace!("end {} ({} us)", self.label, elapsed.as_micros());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_stats_track_maxima() {
        let mut stats = QueryStats::default();
        stats.record_gjk(3);
        stats.record_gjk(7);
        stats.record_toi(4, 10, 6);

        let mut total = QueryStats::default();
        total.record_gjk(9);
        total.merge(&stats);
        assert_eq!(total.gjk_calls, 3);
        assert_eq!(total.gjk_iterations, 19);
        assert_eq!(total.gjk_max_iterations, 9);
        assert_eq!(total.toi_max_root_iterations, 6);
    }

    #[test]
    fn scoped_timer_accumulates() {
        let mut slot = Duration::ZERO;
        {
            let _timer = ScopedTimer::new("test", &mut slot);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(slot >= Duration::from_millis(1));
    }
}
