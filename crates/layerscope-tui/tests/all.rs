// Single integration test binary that aggregates all test modules.
// The submodules live in `tests/suite/`.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod suite;
