//! Options: defaults, JSON config and `STANDARDS_*` environment overrides.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    Env { key: String, value: String },
}

/// Toggles and header names for the request pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StandardsOptions {
    pub enable_multi_tenancy: bool,
    pub enable_request_context: bool,
    pub enable_correlation_id: bool,
    pub correlation_id_header: String,
    pub tenant_id_header: String,
    pub validate_tenant_from_jwt: bool,
    pub enable_security_headers: bool,
    pub enable_request_logging: bool,
    pub jwt: JwtClaimOptions,
    pub file_upload: FileUploadOptions,
}

impl Default for StandardsOptions {
    fn default() -> Self {
        Self {
            enable_multi_tenancy: false,
            enable_request_context: true,
            enable_correlation_id: true,
            correlation_id_header: "X-Correlation-Id".to_string(),
            tenant_id_header: "X-Tenant-Id".to_string(),
            validate_tenant_from_jwt: true,
            enable_security_headers: true,
            enable_request_logging: false,
            jwt: JwtClaimOptions::default(),
            file_upload: FileUploadOptions::default(),
        }
    }
}

/// Claim names read from an already validated token. Signature checks belong to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JwtClaimOptions {
    pub tenant_id_claim_type: String,
    pub user_id_claim_type: String,
}

impl Default for JwtClaimOptions {
    fn default() -> Self {
        Self {
            tenant_id_claim_type: "tenant_id".to_string(),
            user_id_claim_type: "user_id".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileUploadOptions {
    pub max_file_size_bytes: u64,
    /// 0 disables the check.
    pub min_file_size_bytes: u64,
    /// Lowercase, with leading dot.
    pub allowed_image_extensions: BTreeSet<String>,
    pub allowed_document_extensions: BTreeSet<String>,
    pub allowed_extensions: BTreeSet<String>,
}

impl Default for FileUploadOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 5 * 1024 * 1024,
            min_file_size_bytes: 0,
            allowed_image_extensions: extensions(&[".jpg", ".jpeg", ".png", ".webp"]),
            allowed_document_extensions: extensions(&[
                ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".txt",
            ]),
            allowed_extensions: BTreeSet::new(),
        }
    }
}

fn extensions(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|e| e.to_string()).collect()
}

impl StandardsOptions {
    /// Parse from JSON; missing keys keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Defaults overridden by process environment (`STANDARDS_MULTI_TENANCY=true`, ...).
    pub fn from_env() -> Result<Self, OptionsError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a lookup function. `from_env` passes `std::env::var`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, OptionsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, target: &mut bool| -> Result<(), OptionsError> {
            if let Some(value) = lookup(key) {
                *target = parse_bool(key, &value)?;
            }
            Ok(())
        };
        flag("STANDARDS_MULTI_TENANCY", &mut self.enable_multi_tenancy)?;
        flag("STANDARDS_REQUEST_CONTEXT", &mut self.enable_request_context)?;
        flag("STANDARDS_CORRELATION_ID", &mut self.enable_correlation_id)?;
        flag("STANDARDS_VALIDATE_TENANT", &mut self.validate_tenant_from_jwt)?;
        flag("STANDARDS_SECURITY_HEADERS", &mut self.enable_security_headers)?;
        flag("STANDARDS_REQUEST_LOGGING", &mut self.enable_request_logging)?;

        if let Some(v) = lookup("STANDARDS_CORRELATION_ID_HEADER") {
            self.correlation_id_header = v;
        }
        if let Some(v) = lookup("STANDARDS_TENANT_ID_HEADER") {
            self.tenant_id_header = v;
        }
        if let Some(v) = lookup("STANDARDS_MAX_UPLOAD_BYTES") {
            self.file_upload.max_file_size_bytes = v.parse().map_err(|_| OptionsError::Env {
                key: "STANDARDS_MAX_UPLOAD_BYTES".into(),
                value: v.clone(),
            })?;
        }
        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, OptionsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OptionsError::Env {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn json_keeps_defaults_for_missing_keys() {
        let opts = StandardsOptions::from_json_str(
            r#"{ "enableMultiTenancy": true, "jwt": { "tenantIdClaimType": "tid" } }"#,
        )
        .unwrap();
        assert!(opts.enable_multi_tenancy);
        assert_eq!(opts.jwt.tenant_id_claim_type, "tid");
        assert_eq!(opts.jwt.user_id_claim_type, "user_id");
        assert_eq!(opts.correlation_id_header, "X-Correlation-Id");
        assert_eq!(opts.file_upload.max_file_size_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STANDARDS_MULTI_TENANCY", "yes"),
            ("STANDARDS_TENANT_ID_HEADER", "X-Org"),
            ("STANDARDS_MAX_UPLOAD_BYTES", "1024"),
        ]
        .into_iter()
        .collect();
        let opts = StandardsOptions::default()
            .with_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(opts.enable_multi_tenancy);
        assert_eq!(opts.tenant_id_header, "X-Org");
        assert_eq!(opts.file_upload.max_file_size_bytes, 1024);
    }

    #[test]
    fn bad_flag_is_rejected() {
        let err = StandardsOptions::default()
            .with_env_overrides(|k| (k == "STANDARDS_SECURITY_HEADERS").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, OptionsError::Env { .. }));
    }
}
