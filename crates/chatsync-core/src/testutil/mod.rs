//! In-memory fakes for the repository ports, gated behind the `test-fakes`
//! feature so this crate's own `tests/` integration tests (and other
//! crates' test suites) can depend on them without shipping test code in
//! release builds (spec §2.4).

pub mod fakes;
