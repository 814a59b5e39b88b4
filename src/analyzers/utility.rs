/// Mean, sample standard deviation and standard error of one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
}

/// Running per-group statistics, updated one value at a time.
///
/// The mean is taken from the plain running sum so that an infinite value
/// yields an infinite mean. The spread uses Welford's update to avoid the
/// cancellation of a sum-of-squares formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accumulator {
    count: usize,
    sum: f64,
    running_mean: f64,
    m2: f64,
}

impl Accumulator {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;

        let delta = value - self.running_mean;
        self.running_mean += delta / self.count as f64;
        self.m2 += delta * (value - self.running_mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Finalizes the group. Spread is `NaN` for a single member, and
    /// everything is `NaN` for an empty accumulator.
    pub fn summary(&self) -> Summary {
        let n = self.count as f64;
        let mean = if self.count == 0 { f64::NAN } else { self.sum / n };

        let std_dev = if self.count < 2 {
            f64::NAN
        } else {
            (self.m2 / (n - 1.0)).sqrt()
        };

        Summary {
            mean,
            std_dev,
            sem: std_dev / n.sqrt(),
        }
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Accumulator::default();
        for value in iter {
            acc.push(value);
        }
        acc
    }
}
