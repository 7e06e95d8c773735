//! Security audit logging for authentication events
//!
//! Provides structured audit logging for logins, logouts, account
//! activation, user creation, registration submissions and access control
//! failures.
//!
//! All audit events are logged at INFO level with the "audit" target,
//! making them easy to filter and route to security monitoring systems.
//!
//! # Example
//!
//! ```ignore
//! use concierge_api::audit::{AuditEvent, audit_log};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     email: user.email.clone(),
//!     role: user.role.to_string(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: Some("Mozilla/5.0...".to_string()),
//! });
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login
    LoginSuccess {
        user_id: i64,
        email: String,
        role: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// User logout
    Logout {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
    },

    /// Activation token redeemed
    AccountActivated {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
    },

    /// Account created from the admin cabinet
    UserCreated {
        user_id: i64,
        email: String,
        role: String,
        created_by: i64,
        ip_address: Option<String>,
    },

    /// Company registration form submitted from the landing page
    RegistrationSubmitted {
        reg_form_id: i64,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Authorization gate refused a request
    AccessDenied {
        user_id: Option<i64>,
        resource: String,
        reason: String,
        required_role: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Session carried a malformed, unknown or expired token
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

/// Log a security audit event with structured fields
///
/// The event is also serialized to JSON for log aggregators. Example output:
///
/// ```json
/// {
///   "event_type": "login_success",
///   "user_id": 42,
///   "email": "user@example.com",
///   "role": "admin",
///   "ip_address": "192.168.1.1",
///   "user_agent": "Mozilla/5.0..."
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            user_id,
            email,
            role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                role = %role,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::Logout {
            user_id,
            email,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "User logout"
            );
        }
        AuditEvent::AccountActivated {
            user_id,
            email,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Account activated"
            );
        }
        AuditEvent::UserCreated {
            user_id,
            email,
            role,
            created_by,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                role = %role,
                created_by = %created_by,
                ip_address = ?ip_address,
                "User created"
            );
        }
        AuditEvent::RegistrationSubmitted {
            reg_form_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                reg_form_id = %reg_form_id,
                email = %email,
                ip_address = ?ip_address,
                "Registration form submitted"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            resource,
            reason,
            required_role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                resource = %resource,
                reason = %reason,
                required_role = ?required_role,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::InvalidToken {
            ip_address, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                reason = %reason,
                "Invalid token"
            );
        }
    }
}

/// Extract IP address from request headers
///
/// Checks X-Forwarded-For, then X-Real-IP. The socket address is not
/// consulted.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    // Check X-Forwarded-For (proxy/load balancer)
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            // Take the first IP in the chain (client IP)
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    // Check X-Real-IP (nginx proxy)
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: 42,
            email: "test@example.com".to_string(),
            role: "admin".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "login_success");
        assert_eq!(json["user_id"], 42);
        assert_eq!(json["email"], "test@example.com");
    }

    #[test]
    fn test_access_denied_serialization() {
        let event = AuditEvent::AccessDenied {
            user_id: None,
            resource: "/my-cabinet-admin/".to_string(),
            reason: "not authenticated".to_string(),
            required_role: Some("admin".to_string()),
            ip_address: None,
            user_agent: None,
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "access_denied");
        assert!(json["user_id"].is_null());
        assert_eq!(json["required_role"], "admin");
    }

    #[test]
    fn test_audit_log_every_variant() {
        // Only checks that logging never panics
        let events = [
            AuditEvent::LoginFailure {
                email: "test@example.com".to_string(),
                reason: "invalid credentials".to_string(),
                ip_address: Some("192.168.1.1".to_string()),
                user_agent: Some("Test Agent".to_string()),
            },
            AuditEvent::Logout {
                user_id: 1,
                email: "test@example.com".to_string(),
                ip_address: None,
            },
            AuditEvent::AccountActivated {
                user_id: 1,
                email: "test@example.com".to_string(),
                ip_address: None,
            },
            AuditEvent::UserCreated {
                user_id: 2,
                email: "new@example.com".to_string(),
                role: "b2b".to_string(),
                created_by: 1,
                ip_address: None,
            },
            AuditEvent::RegistrationSubmitted {
                reg_form_id: 3,
                email: "ops@acme.test".to_string(),
                ip_address: None,
                user_agent: None,
            },
            AuditEvent::InvalidToken {
                ip_address: None,
                user_agent: None,
                reason: "malformed token".to_string(),
            },
        ];

        for event in &events {
            audit_log(event);
        }
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        let ip = extract_ip_address(&headers);
        assert_eq!(ip, Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        let ip = extract_ip_address(&headers);
        assert_eq!(ip, Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::USER_AGENT,
            "Mozilla/5.0 (Test)".parse().unwrap(),
        );

        let ua = extract_user_agent(&headers);
        assert_eq!(ua, Some("Mozilla/5.0 (Test)".to_string()));
    }

    #[test]
    fn test_extract_missing_headers() {
        let headers = axum::http::HeaderMap::new();

        assert_eq!(extract_ip_address(&headers), None);
        assert_eq!(extract_user_agent(&headers), None);
    }
}
