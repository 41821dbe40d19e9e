use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use onair_station::{AuditError, AuthError, BroadcastError, DatabaseError, DeviceError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An admin already exists")]
    AdminExists,
    #[error("Not authorized to {0}")]
    NotAuthorized(&'static str),
    #[error("No live time slot covers this broadcaster right now")]
    OutsideTimeSlot,
    #[error("No active broadcast session")]
    NoActiveSession,
    #[error("Port {0} does not exist")]
    PortNotFound(String),
    #[error("Port {0} is in use by another application")]
    PortBusy(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::AdminExists => StatusCode::CONFLICT,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::PortBusy(_) => StatusCode::CONFLICT,
            Self::NotAuthorized(_) => StatusCode::FORBIDDEN,
            Self::OutsideTimeSlot => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::NoActiveSession => StatusCode::NOT_FOUND,
            Self::PortNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::AdminExists => Self::AdminExists,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<BroadcastError> for ServerError {
    fn from(value: BroadcastError) -> Self {
        match value {
            BroadcastError::NotAuthorized { action } => Self::NotAuthorized(action),
            BroadcastError::OutsideTimeSlot => Self::OutsideTimeSlot,
            BroadcastError::NoActiveSession => Self::NoActiveSession,
            BroadcastError::Db(e) => e.into(),
        }
    }
}

impl From<DeviceError> for ServerError {
    fn from(value: DeviceError) -> Self {
        match value {
            DeviceError::NotFound(port) => Self::PortNotFound(port),
            DeviceError::ExclusiveAccess(port) => Self::PortBusy(port),
            DeviceError::Backend(e) => Self::Unknown(e),
        }
    }
}

impl From<AuditError> for ServerError {
    fn from(value: AuditError) -> Self {
        Self::Unknown(value.to_string())
    }
}
