use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use sshcommand_core::*;
use sshcommand_exec::{
    AttemptOutcome, ExecError, ExecutionRequest, RemoteExecutor, TransportPhase,
};

// Mock implementations
struct MockExecutor {
    outcome: AttemptOutcome,
    calls: AtomicU32,
}

impl MockExecutor {
    fn new(outcome: AttemptOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn attempt(&self, request: &ExecutionRequest) -> AttemptOutcome {
        assert_eq!(request.connection.address(), "10.0.0.5:22");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn executor_type(&self) -> &'static str {
        "mock"
    }
}

fn params(command: &str) -> CommandParams {
    CommandParams {
        password: Some("secret".to_string()),
        insecure_ignore_host_key: true,
        ..CommandParams::new("10.0.0.5", command)
    }
}

#[tokio::test]
async fn test_apply_success_builds_record() {
    let executor = MockExecutor::new(AttemptOutcome::Success(Vec::new()));

    let resource = apply(params("true"), &executor).await.unwrap();

    assert_eq!(resource.result, "");
    assert_eq!(resource.id, resource_id("10.0.0.5", "true"));
    assert_eq!(executor.calls(), 1);

    let json = serde_json::to_value(&resource).unwrap();
    assert_eq!(json["host"], "10.0.0.5");
    assert_eq!(json["command"], "true");
}

#[tokio::test]
async fn test_apply_tolerates_execution_failure() {
    let executor = MockExecutor::new(AttemptOutcome::ExecutionFailure {
        output: b"some output\n".to_vec(),
        error: ExecError::Execution {
            exit_status: Some(1),
            message: "process exited with status 1".to_string(),
        },
    });
    let params = CommandParams {
        ignore_execute_errors: true,
        ..params("exit 1")
    };

    let resource = apply(params, &executor).await.unwrap();

    assert_eq!(resource.result, "some output\n");
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_apply_reports_execution_failure() {
    let executor = MockExecutor::new(AttemptOutcome::ExecutionFailure {
        output: Vec::new(),
        error: ExecError::Execution {
            exit_status: Some(1),
            message: "process exited with status 1".to_string(),
        },
    });

    let err = apply(params("exit 1"), &executor).await.unwrap_err();

    assert!(matches!(err, CoreError::Exec(ExecError::Execution { .. })));
    assert!(!err.is_validation());
}

#[tokio::test(start_paused = true)]
async fn test_apply_retries_transport_failure_until_timeout() {
    let executor = MockExecutor::new(AttemptOutcome::TransportFailure(ExecError::Transport {
        phase: TransportPhase::Auth,
        message: "unable to authenticate".to_string(),
    }));
    let params = CommandParams {
        retry: true,
        retry_timeout: "500ms".to_string(),
        retry_interval: "100ms".to_string(),
        ignore_execute_errors: true,
        ..params("uptime")
    };

    let err = apply(params, &executor).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Exec(ExecError::Transport {
            phase: TransportPhase::Auth,
            ..
        })
    ));
    assert!((4..=6).contains(&executor.calls()));
}

#[tokio::test]
async fn test_apply_without_credentials_makes_no_attempt() {
    let executor = MockExecutor::new(AttemptOutcome::Success(Vec::new()));
    let params = CommandParams {
        password: None,
        ..params("true")
    };

    let err = apply(params, &executor).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(executor.calls(), 0);
}
