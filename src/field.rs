use ndarray::Array2;

/// The three time slots of the leapfrog scheme.
///
/// All buffers share the same l x l dimension, fixed at construction.
/// `current` holds u(t), `next` u(t + dt), `previous` u(t - dt).
pub struct Wavefield {
    pub current: Array2<f64>,
    pub next: Array2<f64>,
    pub previous: Array2<f64>,
}

impl Wavefield {
    pub fn new(l: usize) -> Self {
        Wavefield {
            current: Array2::zeros((l, l)),
            next: Array2::zeros((l, l)),
            previous: Array2::zeros((l, l)),
        }
    }

    pub fn reset(&mut self) {
        // Set all buffers back to zero
        self.current.fill(0.0);
        self.next.fill(0.0);
        self.previous.fill(0.0);
    }

    /// Advance the time slots by one step.
    ///
    /// After the call `previous` holds the old `current` and `current` the
    /// old `next`. The buffer left in `next` is stale and must be fully
    /// rewritten before it is read again; the interior and boundary passes
    /// together cover every cell.
    pub fn rotate(&mut self) {
        std::mem::swap(&mut self.previous, &mut self.current);
        std::mem::swap(&mut self.current, &mut self.next);
    }

    pub fn dim(&self) -> usize {
        self.current.nrows()
    }
}
