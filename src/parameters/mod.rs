//! # Parameter bookkeeping
//!
//! Building blocks shared by the fit model, the integral and the built-in
//! minimizer:
//!
//! - [`Bounds`] and [`BoundsTransform`]: closed parameter intervals and the
//!   Minuit-style mapping to unbounded internal values
//! - [`IndexedStore`]: a fixed-length container whose accessors validate the index
//! - [`LowerTriangle`]: symmetric covariance storage addressed by index pair
//!
//! ```rust
//! use spectrum_fitter::parameters::{Access, LowerTriangle};
//!
//! let mut cov = LowerTriangle::zeros(2);
//! cov.set(1, 0, 0.5).unwrap();
//! assert_eq!(cov.get(0, 1).unwrap(), (0.5, Access::Swapped));
//! ```

pub mod bounds;
pub mod indexed;

pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use indexed::{Access, IndexedStore, LowerTriangle};
