pub mod stub_remote;
pub mod unavailable_persistence;

pub use stub_remote::StubRemote;
pub use unavailable_persistence::UnavailablePersistence;
