//! Acceptance check for installed units.

use fuse_harness_config::VerificationPolicy;
use thiserror::Error;

use crate::management::{Subsystem, UnitId, UnitStatusRecord};

/// A unit reported a state the policy does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error(
        "unit {id} ({name} {version}) is in state {} instead of {expected}",
        .state.as_deref().unwrap_or("<none>")
    )]
    BadCoreState {
        id: UnitId,
        name: String,
        version: String,
        state: Option<String>,
        expected: String,
    },
    #[error(
        "unit {id} ({name} {version}) reports {subsystem} state {state} instead of {expected}"
    )]
    BadSubsystemState {
        id: UnitId,
        name: String,
        version: String,
        subsystem: Subsystem,
        state: String,
        expected: String,
    },
}

/// Checks `record` against `policy`.
///
/// The core state must match the accepted active token. Each sub-framework
/// state that is present and not blank must match the accepted created token.
/// Comparisons ignore ASCII case.
pub fn verify(
    record: &UnitStatusRecord,
    policy: &VerificationPolicy,
) -> Result<(), VerificationError> {
    let core_accepted = record
        .core_state
        .as_deref()
        .is_some_and(|state| state.eq_ignore_ascii_case(policy.active()));
    if !core_accepted {
        return Err(VerificationError::BadCoreState {
            id: record.id,
            name: record.name.clone(),
            version: record.version.clone(),
            state: record.core_state.clone(),
            expected: policy.active().to_owned(),
        });
    }

    let rejected = record.subsystems.iter().find(|(_, state)| {
        !state.trim().is_empty() && !state.eq_ignore_ascii_case(policy.created())
    });
    if let Some((subsystem, state)) = rejected {
        return Err(VerificationError::BadSubsystemState {
            id: record.id,
            name: record.name.clone(),
            version: record.version.clone(),
            subsystem: *subsystem,
            state: state.clone(),
            expected: policy.created().to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn policy() -> VerificationPolicy {
        VerificationPolicy::default()
    }

    fn unit() -> UnitStatusRecord {
        UnitStatusRecord::new(UnitId(42), "com.example.app", "1.2.0")
    }

    #[rstest]
    #[case::core_only(unit().with_core_state("ACTIVE"))]
    #[case::mixed_case(unit().with_core_state("Active"))]
    #[case::blueprint_created(
        unit().with_core_state("ACTIVE").with_subsystem(Subsystem::Blueprint, "Created")
    )]
    #[case::blank_blueprint(unit().with_core_state("ACTIVE").with_subsystem(Subsystem::Blueprint, ""))]
    #[case::whitespace_spring(unit().with_core_state("ACTIVE").with_subsystem(Subsystem::Spring, "  "))]
    #[case::both_created(
        unit()
            .with_core_state("ACTIVE")
            .with_subsystem(Subsystem::Blueprint, "CREATED")
            .with_subsystem(Subsystem::Spring, "created")
    )]
    fn accepts_active_units(policy: VerificationPolicy, #[case] record: UnitStatusRecord) {
        assert_eq!(verify(&record, &policy), Ok(()));
    }

    #[rstest]
    #[case::installed(Some("INSTALLED"))]
    #[case::resolved(Some("Resolved"))]
    #[case::absent(None)]
    fn rejects_inactive_core_state(policy: VerificationPolicy, #[case] state: Option<&str>) {
        let mut record = unit();
        record.core_state = state.map(str::to_owned);
        let error = verify(&record, &policy).expect_err("core state must be active");
        assert!(matches!(
            error,
            VerificationError::BadCoreState { id: UnitId(42), .. }
        ));
    }

    #[rstest]
    fn bad_core_state_wins_over_subsystem_state(policy: VerificationPolicy) {
        let record = unit()
            .with_core_state("RESOLVED")
            .with_subsystem(Subsystem::Blueprint, "Failure");
        assert!(matches!(
            verify(&record, &policy),
            Err(VerificationError::BadCoreState { .. })
        ));
    }

    #[rstest]
    #[case::blueprint_failure(Subsystem::Blueprint, "Failure")]
    #[case::spring_waiting(Subsystem::Spring, "Waiting")]
    fn rejects_unfinished_subsystem(
        policy: VerificationPolicy,
        #[case] subsystem: Subsystem,
        #[case] state: &str,
    ) {
        let record = unit()
            .with_core_state("ACTIVE")
            .with_subsystem(subsystem, state);
        let error = verify(&record, &policy).expect_err("subsystem must be created");
        assert_eq!(
            error,
            VerificationError::BadSubsystemState {
                id: UnitId(42),
                name: String::from("com.example.app"),
                version: String::from("1.2.0"),
                subsystem,
                state: state.to_owned(),
                expected: String::from("CREATED"),
            }
        );
    }

    #[rstest]
    fn message_identifies_the_unit(policy: VerificationPolicy) {
        let record = unit().with_core_state("INSTALLED");
        let message = verify(&record, &policy)
            .expect_err("installed is not active")
            .to_string();
        assert_eq!(
            message,
            "unit 42 (com.example.app 1.2.0) is in state INSTALLED instead of ACTIVE"
        );
    }

    #[test]
    fn custom_policy_tokens_apply() {
        let policy = VerificationPolicy::new("RUNNING", "READY");
        let record = unit()
            .with_core_state("running")
            .with_subsystem(Subsystem::Spring, "ready");
        assert_eq!(verify(&record, &policy), Ok(()));
    }
}
