use thiserror::Error;

use crate::gateway::GatewayError;
use crate::invoice::InvoiceError;
use crate::pricing::PricingError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("invoice failure: {0}")]
    Invoice(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<GatewayError> for ApplicationError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Validation(message) => {
                Self::Domain(DomainError::InvariantViolation(message))
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<InvoiceError> for ApplicationError {
    fn from(value: InvoiceError) -> Self {
        Self::Invoice(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Chat-safe text; never carries internal error details.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "❌ Запит не вдалося обробити. Перевірте дані та спробуйте ще раз.",
            Self::ServiceUnavailable { .. } => "⏳ Сервіс тимчасово недоступний. Спробуйте пізніше.",
            Self::Internal { .. } => "Сталася внутрішня помилка. Зверніться до менеджера.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Invoice(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::gateway::GatewayError;
    use crate::pricing::PricingError;

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "missing customer name".to_owned(),
        ))
        .into_interface("upd-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "upd-1"
        ));
    }

    #[test]
    fn pricing_error_is_a_domain_error() {
        let error = DomainError::from(PricingError::WidthExceedsMaximum { max_width_mm: 300 });
        assert_eq!(error.to_string(), "requested width exceeds the maximum tier of 300 mm");
    }

    #[test]
    fn gateway_connection_failure_maps_to_service_unavailable() {
        let interface = ApplicationError::from(GatewayError::Connection("pool timed out".into()))
            .into_interface("upd-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "upd-2");
        assert_eq!(
            interface.user_message(),
            "⏳ Сервіс тимчасово недоступний. Спробуйте пізніше."
        );
    }

    #[test]
    fn gateway_validation_failure_maps_to_bad_request() {
        let application = ApplicationError::from(GatewayError::Validation("blank phone".into()));
        assert!(matches!(application, ApplicationError::Domain(_)));
    }

    #[test]
    fn invoice_error_maps_to_internal() {
        let interface =
            ApplicationError::Invoice("template missing".to_owned()).into_interface("upd-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert!(!interface.user_message().contains("template"));
    }
}
