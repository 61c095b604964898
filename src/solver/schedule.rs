// Hyperparameter schedules for Q-learning.
// Every schedule is a pure function of the 1-indexed step count; step 0 is
// treated as step 1.

pub trait Schedule {
    fn value(&self, n: u64) -> f64;
}

impl<F: Fn(u64) -> f64> Schedule for F {
    fn value(&self, n: u64) -> f64 {
        self(n)
    }
}

fn steps_taken(n: u64) -> f64 {
    n.saturating_sub(1) as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant(pub f64);

impl Schedule for Constant {
    fn value(&self, _n: u64) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}

// initial∙rateⁿ⁻¹, never below `minimum`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    pub initial: f64,
    pub minimum: f64,
    pub rate: f64,
}

impl Schedule for ExponentialDecay {
    fn value(&self, n: u64) -> f64 {
        (self.initial * self.rate.powf(steps_taken(n)))
            .max(self.minimum)
            .clamp(0.0, 1.0)
    }
}

// Moves from `start` to `end` over `steps` steps, then stays at `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearDecay {
    pub start: f64,
    pub end: f64,
    pub steps: u64,
}

impl Schedule for LinearDecay {
    fn value(&self, n: u64) -> f64 {
        let progress = (steps_taken(n) / self.steps.max(1) as f64).min(1.0);
        (self.start + (self.end - self.start) * progress).clamp(0.0, 1.0)
    }
}

// initial / (1 + rate∙(n - 1)).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseTime {
    pub initial: f64,
    pub rate: f64,
}

impl Schedule for InverseTime {
    fn value(&self, n: u64) -> f64 {
        (self.initial / (1.0 + self.rate * steps_taken(n))).clamp(0.0, 1.0)
    }
}

pub const DEFAULT_EPSILON: ExponentialDecay = ExponentialDecay {
    initial: 1.0,
    minimum: 0.05,
    rate: 0.9995,
};

pub const DEFAULT_ALPHA: InverseTime = InverseTime {
    initial: 1.0,
    rate: 1e-4,
};

// Exploration rate for the nth step, in [0, 1].
pub fn schedule_epsilon(n: u64) -> f64 {
    DEFAULT_EPSILON.value(n)
}

// Learning rate for the nth update, in (0, 1].
pub fn schedule_alpha(n: u64) -> f64 {
    DEFAULT_ALPHA.value(n).max(f64::MIN_POSITIVE)
}
