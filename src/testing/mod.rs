//! Test support: a scriptable in-process backend and camera fixtures.
//!
//! Compiled into the library so integration tests can drive the session
//! state machine deterministically without hardware.

mod fake_backend;

pub use fake_backend::{
    fake_jpeg, fixture_back_camera, fixture_front_camera, CollectingListener, FakeBackend,
};
