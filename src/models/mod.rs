// Data models for capture frames, pose landmarks and gallery assets

pub mod asset;
pub mod capture;
pub mod pose;
