//! Rounding and dose-grid helpers shared by the calculation modules.

/// Whether a number counts as a supplied dose.
///
/// Zero and NaN mean "nothing entered". Negative values are NOT absent: they
/// flow through the arithmetic and the input boundary has to reject them.
pub fn is_usable(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

/// Round to 2 decimals, half away from zero at the 0.01 unit
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 1 decimal
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Snap to the nearest multiple of `step`
pub fn snap_to_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

/// Titration grid: the drug's step when it has one, else 2 decimals
pub fn snap_or_round2(value: f64, step: Option<f64>) -> f64 {
    match step {
        Some(step) => snap_to_step(value, step),
        None => round2(value),
    }
}

/// Pick the rung closest to `value`.
///
/// Only a strictly closer rung replaces the current pick, so on an exact
/// midpoint the rung listed first wins. Returns `None` for an empty list.
pub fn nearest_allowed_dose(value: f64, allowed: &[f64]) -> Option<f64> {
    let (first, rest) = allowed.split_first()?;
    let nearest = rest.iter().fold(*first, |prev, &curr| {
        if (curr - value).abs() < (prev - value).abs() {
            curr
        } else {
            prev
        }
    });
    Some(nearest)
}

/// Render a number for order text: 2 decimals, no trailing zeros ("96", "10.42")
pub fn format_amount(value: f64) -> String {
    format!("{}", round2(value))
}
