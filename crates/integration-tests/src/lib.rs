//! Cross-crate tests for msgboard. The suites live under `tests/`.
