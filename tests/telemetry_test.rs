//! Integration tests for telemetry initialization and span helpers.

use restrictq::guard::ExecutionState;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process, so a second
    // init in the same binary may return Err; that is acceptable.
    let config = restrictq::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "restrictq-test".to_string(),
        log_level: "debug".to_string(),
    };
    let _guard = restrictq::telemetry::init_telemetry(config);
}

#[test]
fn job_span_records_transitions() {
    let span = restrictq::telemetry::job::start_job_span("Resize", "images");
    let states = [
        ExecutionState::Reserved,
        ExecutionState::Executing,
        ExecutionState::Succeeded,
        ExecutionState::Released,
    ];
    for pair in states.windows(2) {
        restrictq::telemetry::job::record_state_transition(
            &span,
            pair[0].as_str(),
            pair[1].as_str(),
        );
    }
}

#[test]
fn execution_state_names() {
    assert_eq!(ExecutionState::Failed.to_string(), "failed");
    assert_eq!(ExecutionState::Reserved.as_str(), "reserved");
}
