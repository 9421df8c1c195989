/// Statistics over the filtered views: trade metrics, histogram binning and
/// the Monte Carlo equity simulator. Everything here is UI-independent.

pub mod histogram;
pub mod metrics;
pub mod monte_carlo;
