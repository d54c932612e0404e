use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Fixed minimum frame time plus a frames-per-second counter.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    budget: Duration,
    frame_start: Instant,
    window_start: Instant,
    frames_in_window: u32,
    fps: f32,
}

impl FrameTimer {
    pub fn new(budget: Duration) -> Self {
        Self::starting_at(budget, Instant::now())
    }

    fn starting_at(budget: Duration, now: Instant) -> Self {
        Self {
            budget,
            frame_start: now,
            window_start: now,
            frames_in_window: 0,
            fps: 0.0,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Frames per second over the last completed one second window.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Starts a frame and returns the time since the previous one started.
    pub fn begin_frame(&mut self) -> Duration {
        self.begin_frame_at(Instant::now())
    }

    fn begin_frame_at(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.frame_start);
        self.frame_start = now;
        self.frames_in_window += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
            self.frames_in_window = 0;
            self.window_start = now;
        }

        delta
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        self.budget
            .saturating_sub(now.saturating_duration_since(self.frame_start))
    }

    /// Blocks until the frame has used up its budget.
    pub fn throttle(&self) {
        let remaining = self.remaining_at(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_frames_over_one_second() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(Duration::from_millis(12), start);

        for frame in 1..=59 {
            timer.begin_frame_at(start + Duration::from_millis(frame * 16));
        }
        assert_eq!(timer.fps(), 0.0);

        timer.begin_frame_at(start + Duration::from_millis(1000));
        assert!((timer.fps() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn delta_is_time_since_previous_frame() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(Duration::from_millis(12), start);

        let delta = timer.begin_frame_at(start + Duration::from_millis(20));
        assert_eq!(delta, Duration::from_millis(20));
    }

    #[test]
    fn remaining_budget_saturates() {
        let start = Instant::now();
        let timer = FrameTimer::starting_at(Duration::from_millis(12), start);

        assert_eq!(
            timer.remaining_at(start + Duration::from_millis(5)),
            Duration::from_millis(7)
        );
        assert_eq!(
            timer.remaining_at(start + Duration::from_millis(30)),
            Duration::ZERO
        );
    }
}
