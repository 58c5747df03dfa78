//! One-step-ahead loss-quantile estimators
//!
//! Three independent methodologies, each consuming a training window of
//! returns and producing a positive loss magnitude:
//!
//! - `historical`: empirical percentile of windowed losses
//! - `parametric`: normal quantile from windowed sample moments
//! - `garch`: GARCH(1,1) conditional volatility with Student-t innovations

mod garch;
mod historical;
mod parametric;

pub use garch::GarchStudentT;
pub use historical::historical_var;
pub use parametric::parametric_var;

pub(crate) use historical::interpolated_percentile;
