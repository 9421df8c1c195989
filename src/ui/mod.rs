pub mod analyzer;
pub mod monte_carlo;
pub mod panels;
pub mod plot;
