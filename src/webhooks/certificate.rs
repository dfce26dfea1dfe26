//! Startup check of the serving certificate.
//!
//! The leaf certificate must be inside its validity window before the TLS
//! listener starts. A certificate that expires within [`EXPIRY_WARNING_DAYS`]
//! days is still served, with a warning.

use std::path::Path;

use tracing::{info, warn};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{ASN1Time, GeneralName};

use crate::webhooks::WebhookError;

/// Remaining lifetime below which startup logs a warning
pub const EXPIRY_WARNING_DAYS: i64 = 7;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// The fields of the serving certificate that startup inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    /// DNS names from the subject alternative name extension
    pub dns_names: Vec<String>,
    pub not_before: ASN1Time,
    pub not_after: ASN1Time,
}

/// Outcome of a successful validity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    ExpiringSoon { days_left: i64 },
}

impl CertificateInfo {
    /// Decode the first certificate of a PEM bundle
    pub fn from_pem(pem: &[u8]) -> Result<Self, WebhookError> {
        let (_, pem) = parse_x509_pem(pem)
            .map_err(|e| WebhookError::TlsConfig(format!("failed to decode certificate PEM: {e}")))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| WebhookError::TlsConfig(format!("failed to parse certificate: {e}")))?;

        let dns_names = match cert.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_string()),
                    _ => None,
                })
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                return Err(WebhookError::TlsConfig(format!(
                    "invalid subject alternative names: {e}"
                )));
            }
        };

        let validity = cert.validity();
        Ok(Self {
            subject: cert.subject().to_string(),
            dns_names,
            not_before: validity.not_before,
            not_after: validity.not_after,
        })
    }

    /// Check the validity window against `now`.
    pub fn check(&self, now: ASN1Time) -> Result<Validity, WebhookError> {
        if now < self.not_before {
            return Err(WebhookError::TlsConfig(format!(
                "certificate is not yet valid (valid from {})",
                self.not_before
            )));
        }
        if now > self.not_after {
            return Err(WebhookError::TlsConfig(format!(
                "certificate expired on {}",
                self.not_after
            )));
        }

        let remaining = self.not_after.timestamp() - now.timestamp();
        if remaining < EXPIRY_WARNING_DAYS * SECS_PER_DAY {
            Ok(Validity::ExpiringSoon {
                days_left: remaining / SECS_PER_DAY,
            })
        } else {
            Ok(Validity::Valid)
        }
    }
}

/// Read the certificate at `cert_path` and fail if it is outside its validity window.
pub async fn validate_certificate(cert_path: &Path) -> Result<CertificateInfo, WebhookError> {
    let pem = tokio::fs::read(cert_path).await.map_err(|e| {
        WebhookError::TlsConfig(format!(
            "failed to read certificate {}: {e}",
            cert_path.display()
        ))
    })?;
    let cert = CertificateInfo::from_pem(&pem)?;

    if let Validity::ExpiringSoon { days_left } = cert.check(ASN1Time::now())? {
        warn!(
            days_left,
            not_after = %cert.not_after,
            "Webhook certificate expires soon"
        );
    }

    info!(
        subject = %cert.subject,
        dns_names = ?cert.dns_names,
        not_after = %cert.not_after,
        "Webhook certificate validated"
    );
    Ok(cert)
}
