use std::time::{Duration, Instant};

/// Holds the event loop to a fixed frame rate, standing in for a browser's
/// animation-frame cadence. Motion is counted in frames, so the pace sets
/// the apparent particle speed.
pub struct Framepacer {
    frame_start: Instant,
    last_frametime: f32,
    limit_frametime: Option<f32>,
}

impl Framepacer {
    pub fn new(framerate: u32) -> Self {
        let mut framepacer = Self {
            frame_start: Instant::now(),
            last_frametime: 0.0,
            limit_frametime: None,
        };
        framepacer.set_framerate(framerate);
        framepacer
    }

    /// `0` disables pacing.
    pub fn set_framerate(&mut self, framerate: u32) {
        self.limit_frametime = (framerate > 0).then(|| 1.0 / framerate as f32);
    }

    pub fn frametime(&self) -> f32 {
        self.last_frametime
    }

    pub fn framerate(&self) -> f32 {
        if self.last_frametime > f32::EPSILON {
            1.0 / self.last_frametime
        } else {
            0.0
        }
    }

    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    pub fn end_frame(&mut self) {
        if let Some(limit_frametime) = self.limit_frametime {
            const ACCURACY: f32 = 0.0001; // 100 microseconds
            let sleep_time = limit_frametime - self.elapsed() - ACCURACY;

            if sleep_time > 0.0 {
                std::thread::sleep(Duration::from_secs_f32(sleep_time));

                while self.elapsed() < limit_frametime {
                    std::thread::yield_now();
                }
            }
        }

        self.last_frametime = self.elapsed();
    }

    fn elapsed(&self) -> f32 {
        self.frame_start.elapsed().as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paced_frame_takes_at_least_the_limit() {
        let mut framepacer = Framepacer::new(100);
        framepacer.begin_frame();
        framepacer.end_frame();

        assert!(framepacer.frametime() >= 0.01);
    }

    #[test]
    fn zero_framerate_is_unpaced() {
        let mut framepacer = Framepacer::new(0);
        framepacer.begin_frame();
        framepacer.end_frame();

        assert!(framepacer.frametime() < 0.01);
    }
}
