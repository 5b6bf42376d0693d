use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use pidloga_core::gateway::GatewayError;

pub mod order;
pub mod product;

pub use order::SqlOrderRepository;
pub use product::SqlCatalogRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(error)) => error.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<RepositoryError> for GatewayError {
    fn from(error: RepositoryError) -> Self {
        if error.is_unique_violation() {
            return Self::Conflict(error.to_string());
        }
        match error {
            RepositoryError::Database(sqlx::Error::RowNotFound) => {
                Self::NotFound("row not found".to_string())
            }
            RepositoryError::Database(sqlx::Error::Database(db)) => {
                Self::Validation(db.message().to_string())
            }
            RepositoryError::Database(other) => Self::Connection(other.to_string()),
            RepositoryError::Decode(message) => Self::Connection(message),
        }
    }
}

fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so that string
/// comparison in SQL matches chronological order.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(decode_error)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{decode_timestamp, encode_timestamp, RepositoryError};
    use pidloga_core::gateway::GatewayError;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).single().expect("valid");
        let late = early + chrono::Duration::microseconds(1);

        let early_text = encode_timestamp(early);
        let late_text = encode_timestamp(late);

        assert_eq!(early_text, "2024-03-07T09:05:00.000000Z");
        assert!(early_text < late_text);
        assert_eq!(decode_timestamp(&late_text).expect("decode"), late);
    }

    #[test]
    fn decode_failures_surface_as_unavailable_storage() {
        let error: GatewayError = RepositoryError::Decode("bad price".to_string()).into();
        assert_eq!(error, GatewayError::Connection("bad price".to_string()));
    }
}
