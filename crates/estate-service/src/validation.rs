//! Field validation for new requests.

use chrono::{DateTime, Utc};
use estate_core::models::request::{ContactMethod, CreateServiceRequest, RequestDetails, RequestKind};

use crate::config::ServiceConfig;
use crate::error::RequestError;

fn required(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        Err(RequestError::MissingField { field })
    } else {
        Ok(())
    }
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Check the kind-specific fields of `input` as of `now`.
pub fn validate_new_request(
    input: &CreateServiceRequest,
    config: &ServiceConfig,
    now: DateTime<Utc>,
) -> Result<(), RequestError> {
    let kind = input.details.kind();
    if matches!(kind, RequestKind::Maintenance | RequestKind::Taxi) {
        required("unit_ref", input.unit_ref.as_deref().unwrap_or_default())?;
    }

    match &input.details {
        RequestDetails::Maintenance { title, description } => {
            required("title", title)?;
            if title.chars().count() > config.max_title_len {
                return Err(RequestError::TooLong {
                    field: "title",
                    max: config.max_title_len,
                });
            }
            required("description", description)?;
        }
        RequestDetails::Taxi {
            pickup_location,
            destination,
            pickup_time,
        } => {
            required("pickup_location", pickup_location)?;
            required("destination", destination)?;
            if !config.taxi_destinations.iter().any(|d| d == destination) {
                return Err(RequestError::UnknownDestination(destination.clone()));
            }
            if *pickup_time <= now {
                return Err(RequestError::PickupInPast);
            }
        }
        RequestDetails::Contact {
            name,
            contact_method,
            email,
            phone,
            message,
        } => {
            required("name", name)?;
            required("message", message)?;
            match contact_method {
                ContactMethod::Email => {
                    let email = email.as_deref().unwrap_or_default();
                    required("email", email)?;
                    if !is_plausible_email(email) {
                        return Err(RequestError::InvalidEmail(email.to_string()));
                    }
                }
                ContactMethod::Phone => {
                    required("phone", phone.as_deref().unwrap_or_default())?;
                }
            }
        }
    }

    Ok(())
}
