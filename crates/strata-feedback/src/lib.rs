//! Type and shape feedback collection.
//!
//! Two independent stores feed the tier engine's specialization decisions:
//!
//! - [`TypeFeedback`] keeps a multiset of observed [`TypeTag`]s per feedback key (a call-site or
//!   parameter slot) and recomputes the dominant tag, stability, and monomorphic flag on every
//!   observation.
//! - [`ShapeCache`] interns canonical shape descriptors keyed by an object's sorted field-name
//!   list, so two objects with the same field set share one descriptor identity.
//!
//! Both are plain owned stores: the runtime session owns one of each and passes them down by
//! reference. Nothing here is a process-wide singleton.

mod shape;
mod types;

pub use shape::{ShapeCache, ShapeDescriptor, ShapeField};
pub use types::{TypeFeedback, TypeFeedbackRecord};

pub use strata_types::TypeTag;

/// Specialization is legal only for monomorphic sites or sites whose dominant tag accounts for
/// more than this share of all observations.
pub const STABILITY_THRESHOLD: f64 = 0.9;
