//! Interpolation helpers.
//!
//! Scalar lerp, cubic Hermite segments for tangent-driven curves, and
//! quaternion NLERP/SLERP with shortest-arc sign correction.

pub mod functions;
