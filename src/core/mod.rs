pub mod config;
pub mod database;

// Pose geometry, angles and rendering
pub mod geometry;
pub mod angles;
pub mod skeleton;
pub mod snapshot;

// Gallery storage
pub mod asset_store;
pub mod display_handles;

// External collaborators
pub mod camera;
pub mod pose_estimator;

// Session orchestration
pub mod liveness;
pub mod analysis;
pub mod comparison;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
