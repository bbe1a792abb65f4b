//! Core trait definitions

mod management;

pub use management::ManagementClient;
