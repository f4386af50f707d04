//! # Stockcast
//!
//! `stockcast` bundles the stock consumption forecasting workspace behind
//! one dependency.
//!
//! - [`stock_forecast`]: ingestion, weekly aggregation, per-product
//!   training, forecasting, artifacts and the batch pipeline
//! - [`forecast_math`]: the standard scaler and regression error metrics
//!
//! ## Example
//!
//! ```
//! use stockcast::LagWindow;
//!
//! let mut window = LagWindow::from_tail(&[10.0, 0.0, 20.0, 30.0]).unwrap();
//! window.push(40.0);
//! assert_eq!(window.lags(), &[40.0, 30.0, 20.0, 0.0]);
//! ```

pub use forecast_math;
pub use stock_forecast;
pub use stock_forecast::*;
