//! Point-in-time aggregation primitives.
//!
//! Every function here takes one entity's chronologically ordered sequence of
//! `n` observations and returns `n + 1` values. Entry `i` aggregates positions
//! `[0, i-1]` only, so entry `0` is the debut value. The extra trailing entry is
//! the *pending* aggregate over the whole sequence, i.e. the value the entity's
//! next (not yet recorded) event would see.
//!
//! Positions are not dates. Callers holding several events on one date read
//! the entry at [`EntityHistory::prior_counts`] rather than the event's own
//! position.
//!
//! [`EntityHistory::prior_counts`]: crate::history::EntityHistory::prior_counts
//!
//! Nulls (`None`) inside a sequence are skipped rather than treated as zero.

use std::collections::VecDeque;

/// `num / den`, or `None` when either side is missing, the denominator is zero,
/// or the quotient is not finite.
pub fn safe_div(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    let (num, den) = (num?, den?);
    if den == 0.0 || !num.is_finite() || !den.is_finite() {
        return None;
    }
    let q = num / den;
    q.is_finite().then_some(q)
}

/// Moves an inclusive series one position later: entry `i + 1` of the result is
/// entry `i` of the input, entry `0` is `debut`.
pub fn shift<T: Clone>(inclusive: &[T], debut: T) -> Vec<T> {
    let mut out = Vec::with_capacity(inclusive.len() + 1);
    out.push(debut);
    out.extend_from_slice(inclusive);
    out
}

#[derive(Debug, Clone)]
struct RollingWindow {
    window: usize,
    slots: VecDeque<(Option<f64>, Option<f64>)>,
}

impl RollingWindow {
    fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            slots: VecDeque::with_capacity(window),
        }
    }

    fn push(&mut self, num: Option<f64>, den: Option<f64>) {
        if self.slots.len() == self.window {
            self.slots.pop_front();
        }
        self.slots.push_back((num, den));
    }

    fn mean(&self) -> Option<f64> {
        let (sum, count) = self
            .slots
            .iter()
            .filter_map(|(v, _)| *v)
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    fn ratio(&self) -> Option<f64> {
        let mut num = 0.0;
        let mut den = 0.0;
        let mut seen = false;
        for (n, d) in &self.slots {
            if let (Some(n), Some(d)) = (n, d) {
                num += n;
                den += d;
                seen = true;
            }
        }
        if !seen {
            return None;
        }
        safe_div(Some(num), Some(den))
    }
}

/// Mean of up to the last `window` prior observations; `None` at debut.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut acc = RollingWindow::new(window);
    let inclusive = values
        .iter()
        .map(|v| {
            acc.push(*v, None);
            acc.mean()
        })
        .collect::<Vec<_>>();
    shift(&inclusive, None)
}

/// Ratio of windowed numerator and denominator sums over the last `window`
/// prior observations. Only positions where both sides are present count.
pub fn rolling_ratio(num: &[Option<f64>], den: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    debug_assert_eq!(num.len(), den.len());
    let mut acc = RollingWindow::new(window);
    let inclusive = num
        .iter()
        .zip(den)
        .map(|(n, d)| {
            acc.push(*n, *d);
            acc.ratio()
        })
        .collect::<Vec<_>>();
    shift(&inclusive, None)
}

/// Mean of all prior observations; `None` at debut.
pub fn expanding_mean(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut sum = 0.0;
    let mut count = 0usize;
    let inclusive = values
        .iter()
        .map(|v| {
            if let Some(v) = v {
                sum += v;
                count += 1;
            }
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        })
        .collect::<Vec<_>>();
    shift(&inclusive, None)
}

/// Cumulative sum of all prior observations; `0.0` at debut.
pub fn expanding_sum(values: &[Option<f64>]) -> Vec<f64> {
    let mut sum = 0.0;
    let inclusive = values
        .iter()
        .map(|v| {
            sum += v.unwrap_or(0.0);
            sum
        })
        .collect::<Vec<_>>();
    shift(&inclusive, 0.0)
}

/// Exponentially weighted mean (`y0 = x0`, `yt = (1 - alpha) * y(t-1) + alpha * xt`)
/// computed including the current observation, then shifted to exclude it.
pub fn ewm_mean(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let alpha = alpha.clamp(f64::EPSILON, 1.0);
    let mut state: Option<f64> = None;
    let inclusive = values
        .iter()
        .map(|v| {
            state = match (state, v) {
                (None, Some(x)) => Some(*x),
                (Some(prev), Some(x)) => Some((1.0 - alpha) * prev + alpha * x),
                (prev, None) => prev,
            };
            state
        })
        .collect::<Vec<_>>();
    shift(&inclusive, None)
}

/// EWM numerator over EWM denominator, each shifted.
pub fn ewm_ratio(num: &[Option<f64>], den: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let num = ewm_mean(num, alpha);
    let den = ewm_mean(den, alpha);
    num.into_iter()
        .zip(den)
        .map(|(n, d)| safe_div(n, d))
        .collect()
}

/// Ratio of cumulative sums over all prior observations.
pub fn expanding_ratio(num: &[Option<f64>], den: &[Option<f64>]) -> Vec<Option<f64>> {
    let num = expanding_sum(num);
    let den = expanding_sum(den);
    num.into_iter()
        .zip(den)
        .map(|(n, d)| safe_div(Some(n), Some(d)))
        .collect()
}
