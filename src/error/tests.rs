//! Tests for error types.

use super::*;

#[test]
fn test_error_display() {
    let err = Error::config("invalid port");
    assert_eq!(err.to_string(), "configuration error: invalid port");
}

#[test]
fn test_repository_error_display() {
    let err = RepositoryError::Fetch {
        branch: "master".to_string(),
        reason: "network unreachable".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "failed to fetch branch 'master': network unreachable"
    );
}

#[test]
fn test_repository_error_conversion() {
    let repo_err = RepositoryError::Open {
        path: "/tmp/none".to_string(),
        reason: "not a repository".to_string(),
    };
    let err: Error = repo_err.into();
    assert!(matches!(err, Error::Repository(_)));
    assert!(err.to_string().starts_with("repository error:"));
}

#[test]
fn test_diff_helper() {
    let err = RepositoryError::diff("bad tree");
    assert_eq!(err.to_string(), "diff error: bad tree");
}

#[test]
fn test_server_error_conversion() {
    let server_err = ServerError::BindFailed {
        address: "127.0.0.1:9000".to_string(),
        reason: "address in use".to_string(),
    };
    let err: Error = server_err.into();
    assert!(matches!(err, Error::Server(_)));
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_result_type_alias() {
    fn returns_ok() -> Result<i32> {
        Ok(42)
    }

    fn returns_err() -> Result<i32> {
        Err(Error::config("test error"))
    }

    assert!(returns_ok().is_ok());
    assert!(returns_err().is_err());
}

#[test]
fn test_error_debug_format() {
    let err = Error::internal("something went wrong");
    let debug_str = format!("{err:?}");
    assert!(debug_str.contains("Internal"));
    assert!(debug_str.contains("something went wrong"));
}
