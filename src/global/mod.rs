pub mod home;

pub use home::SnapshareHome;
