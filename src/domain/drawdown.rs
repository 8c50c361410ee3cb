//! Largest peak-to-trough decline of an equity series.

/// Steps needed to climb back to the pre-drawdown level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Recovered(usize),
    NotRecovered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawDown {
    /// Relative decline, `<= 0`.
    pub biggest_draw_down: f64,
    pub periods_in_max_dd: usize,
    pub time_to_recover: Recovery,
    pub from_index: usize,
    pub to_index: usize,
}

impl Default for DrawDown {
    fn default() -> Self {
        DrawDown {
            biggest_draw_down: 0.0,
            periods_in_max_dd: 0,
            time_to_recover: Recovery::Recovered(0),
            from_index: 0,
            to_index: 0,
        }
    }
}

/// For every index `i`, the drawdown is `min(E[i..]) / E[i] - 1` with the
/// earliest minimum winning ties. The most negative one is kept; recovery
/// counts steps after the trough until equity is back at `E[from_index]`.
///
/// Quadratic in the series length. Non-positive equity values cannot anchor a
/// drawdown and are skipped as starting points.
pub fn compute_drawdown(series: &[f64]) -> DrawDown {
    let mut result = DrawDown::default();

    for i in 0..series.len() {
        let start = series[i];
        if start <= 0.0 {
            continue;
        }

        let mut min = start;
        let mut trough = i;
        for (j, &value) in series.iter().enumerate().skip(i + 1) {
            if value < min {
                min = value;
                trough = j;
            }
        }

        let dd = min / start - 1.0;
        if dd < result.biggest_draw_down {
            result.biggest_draw_down = dd;
            result.periods_in_max_dd = trough - i;
            result.from_index = i;
            result.to_index = trough;
        }
    }

    if result.periods_in_max_dd > 0 {
        let peak = series[result.from_index];
        result.time_to_recover = series
            .iter()
            .enumerate()
            .skip(result.to_index + 1)
            .find(|&(_, &value)| value >= peak)
            .map(|(k, _)| Recovery::Recovered(k - result.to_index))
            .unwrap_or(Recovery::NotRecovered);
    }

    result
}
