use std::time::Instant;

/// Termination and sampling parameters for running a chain.
#[derive(Debug, Copy, Clone)]
pub struct Control {
    /// Stop after this many steps (0 for no limit).
    pub steps: usize,
    /// Stop after this many milliseconds (0 for no limit).
    pub runtime: usize,
    /// Discard this many samples before reporting any.
    pub burn: usize,
    /// Report every `thin`th sample (0 or 1 for every sample).
    pub thin: usize,
    /// Restart after this many steps without improvement (0 to never restart).
    pub restart: usize,
    /// Log progress every `print` samples (0 to never log).
    pub print: usize,
    pub start: Option<Instant>,
    pub done_steps: usize,
}

impl Control {
    pub fn new(
        steps: usize,
        runtime: usize,
        burn: usize,
        thin: usize,
        restart: usize,
        print: usize,
    ) -> Self {
        Control {
            steps,
            runtime,
            burn,
            thin,
            restart,
            print,
            done_steps: 0,
            start: None,
        }
    }
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
        self.done_steps = 0;
    }
    pub fn started(&self) -> bool {
        self.start.is_some()
    }
    pub fn running(&mut self) -> bool {
        self.done_steps += 1;
        let elapsed = self
            .start
            .map(|start| start.elapsed().as_millis() as usize)
            .unwrap_or(0);
        !((self.steps > 0 && self.done_steps > self.steps)
            || (self.runtime > 0 && elapsed >= self.runtime))
    }
    /// `true` if the current step should be reported given burn-in and thinning.
    pub fn reporting(&self) -> bool {
        self.done_steps > self.burn && (self.thin <= 1 || self.done_steps % self.thin == 0)
    }
}

impl Default for Control {
    fn default() -> Self {
        Control::new(0, 0, 0, 0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_bound_the_run() {
        let mut ctl = Control::new(3, 0, 1, 2, 0, 0);
        ctl.start();
        let mut reported = vec![];
        while ctl.running() {
            reported.push(ctl.reporting());
        }
        assert_eq!(ctl.done_steps, 4);
        assert_eq!(reported, vec![false, true, false]);
    }
}
