use sea_orm::DbErr;
use thiserror::Error;

/// Domain error surfaced by the employee service.
///
/// Validation and not-found are distinct variants so the HTTP boundary can
/// map them to 400 and 404 respectively.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("{0}")]
    Validation(String),
    #[error("Employee not found with id: {0}")]
    NotFound(i64),
    #[error(transparent)]
    Db(#[from] DbErr),
}

pub type EmployeeResult<T> = Result<T, EmployeeError>;
