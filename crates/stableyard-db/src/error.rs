//! Translation of sqlx failures into the domain error.

use stableyard_core::Error;

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> Error {
	match err {
		sqlx::Error::RowNotFound => Error::NotFound("Record not found".to_string()),
		other => {
			tracing::error!(error = %other, "database operation failed");
			Error::Database(other.to_string())
		}
	}
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Maps a unique-constraint violation to `Conflict(message)`, anything else
/// through [`map_sqlx_error`].
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
	move |err| {
		if is_unique_violation(&err) {
			Error::Conflict(message.to_string())
		} else {
			map_sqlx_error(err)
		}
	}
}
