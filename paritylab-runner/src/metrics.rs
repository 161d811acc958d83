//! Performance metrics: pure functions over realized round-trip pnl.
//!
//! Every metric takes the per-trade net pnl sequence (in quote currency, in
//! close order) and returns a scalar. No dependencies on feeds or the engine.

/// Running total of realized pnl, starting after the first trade.
pub fn cumulative_pnl(pnls: &[f64]) -> Vec<f64> {
    pnls.iter()
        .scan(0.0, |total, &p| {
            *total += p;
            Some(*total)
        })
        .collect()
}

/// Fraction of trades with positive pnl.
pub fn win_rate(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    pnls.iter().filter(|&&p| p > 0.0).count() as f64 / pnls.len() as f64
}

/// Gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Largest peak-to-trough decline of the realized pnl curve, as a
/// non-positive amount. The curve starts at zero before the first trade.
pub fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for total in cumulative_pnl(pnls) {
        peak = peak.max(total);
        max_dd = max_dd.min(total - peak);
    }
    max_dd
}
