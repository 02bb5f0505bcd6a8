//! Order ownership rules.

use common::Principal;

use crate::error::OrderError;

/// Resolves who owns a new order.
///
/// An authenticated principal is authoritative and any caller-supplied
/// email is ignored. Without a principal this is a guest checkout and
/// the supplied email becomes the owner.
pub fn resolve_owner(
    principal: Option<&Principal>,
    guest_email: Option<&str>,
) -> Result<String, OrderError> {
    if let Some(principal) = principal {
        return Ok(principal.email.clone());
    }

    let email = guest_email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(OrderError::GuestEmailRequired)?;

    if !is_plausible_email(email) {
        return Err(OrderError::InvalidEmail(email.to_string()));
    }

    Ok(email.to_string())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
