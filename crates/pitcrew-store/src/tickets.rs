//! Expiring download and upload tickets
//!
//! URLs handed to users carry an unguessable token that the gateway checks
//! against this issuer. Issued tickets live in a bounded LRU and expire
//! after their TTL, so a leaked link stops working on its own.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::paths;

/// Maximum number of outstanding tickets
const MAX_TICKETS: usize = 1000;

/// Default validity of an issued ticket
pub const DEFAULT_EXPIRES_MINUTES: i64 = 60;

/// HTTP method a ticket is valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketMethod {
    Get,
    Put,
}

/// One issued ticket
#[derive(Debug, Clone)]
pub struct Ticket {
    pub object: String,
    pub method: TicketMethod,
    pub expires_at: DateTime<Utc>,
}

/// An upload ticket plus the URL the user should use
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub url: String,
    pub object: String,
}

/// Issues and validates expiring artifact URLs
pub struct TicketIssuer {
    base_url: String,
    tickets: Mutex<LruCache<String, Ticket>>,
}

impl TicketIssuer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            tickets: Mutex::new(LruCache::new(
                NonZeroUsize::new(MAX_TICKETS).expect("MAX_TICKETS is non-zero"),
            )),
        }
    }

    /// Issue a download URL for an existing artifact object
    pub fn issue_download(&self, object: &str, expires_minutes: i64) -> Result<String> {
        let ticket = self.issue(object, TicketMethod::Get, expires_minutes)?;
        Ok(format!(
            "{}/artifacts/{}?token={}",
            self.base_url, object, ticket
        ))
    }

    /// Issue an upload URL for a session's asset slot
    pub fn issue_upload(&self, session_id: &str, expires_minutes: i64) -> Result<UploadTicket> {
        if session_id.is_empty() {
            return Err(anyhow!("Session id must not be empty"));
        }
        let object = paths::asset_object_path(session_id, "my-asset.glb");
        let token = self.issue(&object, TicketMethod::Put, expires_minutes)?;
        Ok(UploadTicket {
            url: format!(
                "{}/api/upload?session_id={}&token={}&object={}",
                self.base_url, session_id, token, object
            ),
            object,
        })
    }

    fn issue(&self, object: &str, method: TicketMethod, expires_minutes: i64) -> Result<String> {
        if object.is_empty() {
            return Err(anyhow!("Object path must not be empty"));
        }
        if expires_minutes <= 0 {
            return Err(anyhow!(
                "Ticket expiry must be positive, got {} minutes",
                expires_minutes
            ));
        }
        let token = Uuid::new_v4().to_string();
        let ticket = Ticket {
            object: object.to_string(),
            method,
            expires_at: Utc::now() + Duration::minutes(expires_minutes),
        };
        debug!(
            "Issued {:?} ticket for {} (valid {} min)",
            method, object, expires_minutes
        );
        self.tickets
            .lock()
            .expect("ticket cache lock poisoned")
            .put(token.clone(), ticket);
        Ok(token)
    }

    /// Look up a token, returning the ticket if it is still valid
    pub fn validate(&self, token: &str) -> Option<Ticket> {
        let mut tickets = self.tickets.lock().expect("ticket cache lock poisoned");
        match tickets.get(token) {
            Some(ticket) if ticket.expires_at > Utc::now() => Some(ticket.clone()),
            Some(_) => {
                tickets.pop(token);
                None
            }
            None => None,
        }
    }

    /// Consume an upload token; valid only once
    pub fn redeem(&self, token: &str) -> Option<Ticket> {
        let mut tickets = self.tickets.lock().expect("ticket cache lock poisoned");
        let ticket = tickets.pop(token)?;
        if ticket.expires_at > Utc::now() {
            Some(ticket)
        } else {
            None
        }
    }

    #[cfg(test)]
    fn insert_expired(&self, token: &str, object: &str) {
        self.tickets.lock().unwrap().put(
            token.to_string(),
            Ticket {
                object: object.to_string(),
                method: TicketMethod::Get,
                expires_at: Utc::now() - Duration::minutes(1),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_from(url: &str) -> String {
        url.split("token=")
            .nth(1)
            .unwrap()
            .split('&')
            .next()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_issue_and_validate_download() {
        let issuer = TicketIssuer::new("http://localhost:8000");
        let object = "game-builds/universal/main/abc/abc.zip";
        let url = issuer.issue_download(object, 30).unwrap();
        assert!(url.starts_with("http://localhost:8000/artifacts/game-builds/"));

        let ticket = issuer.validate(&token_from(&url)).unwrap();
        assert_eq!(ticket.object, object);
        assert_eq!(ticket.method, TicketMethod::Get);
    }

    #[test]
    fn test_empty_object_rejected() {
        let issuer = TicketIssuer::new("http://localhost:8000");
        assert!(issuer.issue_download("", 30).is_err());
    }

    #[test]
    fn test_negative_expiry_rejected() {
        let issuer = TicketIssuer::new("http://localhost:8000");
        assert!(issuer.issue_download("some/file.zip", -5).is_err());
        assert!(issuer.issue_download("some/file.zip", 0).is_err());
    }

    #[test]
    fn test_unknown_token_invalid() {
        let issuer = TicketIssuer::new("http://localhost:8000");
        assert!(issuer.validate("not-a-token").is_none());
    }

    #[test]
    fn test_expired_ticket_invalid() {
        let issuer = TicketIssuer::new("http://localhost:8000");
        issuer.insert_expired("stale", "x.zip");
        assert!(issuer.validate("stale").is_none());
        // Expired entries are evicted on sight
        assert!(issuer.validate("stale").is_none());
    }

    #[test]
    fn test_upload_ticket_single_use() {
        let issuer = TicketIssuer::new("http://localhost:8000");
        let upload = issuer.issue_upload("session_001", 60).unwrap();
        assert!(upload.url.contains("session_id=session_001"));
        assert_eq!(
            upload.object,
            "user-asset-files/session_001/assets/my-asset.glb"
        );

        let token = token_from(&upload.url);
        let ticket = issuer.redeem(&token).unwrap();
        assert_eq!(ticket.method, TicketMethod::Put);
        assert!(issuer.redeem(&token).is_none());
    }

    #[test]
    fn test_empty_session_rejected() {
        let issuer = TicketIssuer::new("http://localhost:8000");
        assert!(issuer.issue_upload("", 60).is_err());
    }
}
