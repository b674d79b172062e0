// Adapters for the external collaborators: camera sources and pose backends

pub mod capture;
pub mod pose;
