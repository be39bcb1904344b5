//! # Strata Core
//!
//! Foundational pieces shared by the Strata LOD builder and selector:
//! - **Math**: glam re-exports, axis-aligned boxes and bounding spheres
//! - **Bounds**: randomized minimal enclosing sphere construction
//! - **Random**: small seedable generators behind an injectable trait

pub mod bounds;
pub mod math;
pub mod random;

pub use bounds::{enclosing_sphere_of_spheres, minimal_enclosing_sphere};
pub use math::{Aabb, BoundingSphere};
pub use random::{Pcg32, RandomSource};
