//! Test suites for the harness orchestrator.

mod support;
