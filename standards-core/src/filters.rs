//! Endpoint filters: upload size, image extension, request validation, error translation.

use std::collections::BTreeMap;
use std::path::Path;

use http::StatusCode;

use crate::middleware::Outcome;
use crate::options::FileUploadOptions;
use crate::response::ApiResponse;
use crate::DomainError;

/// First file of a multipart upload, as parsed by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub length: u64,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, length: u64) -> Self {
        Self {
            file_name: file_name.into(),
            length,
        }
    }

    /// Lowercase extension with leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
    }
}

fn bad_request(message: impl Into<String>, errors: Option<Vec<String>>) -> Outcome {
    Outcome::json(StatusCode::BAD_REQUEST, &ApiResponse::<()>::error(message, errors))
}

/// Size checks on the first uploaded file. `None` means the request carried no file.
pub fn validate_upload(file: Option<&UploadedFile>, options: &FileUploadOptions) -> Result<(), Outcome> {
    let Some(file) = file else {
        return Err(bad_request("No file was uploaded.", None));
    };
    if file.length > options.max_file_size_bytes {
        let max_mb = options.max_file_size_bytes as f64 / (1024.0 * 1024.0);
        return Err(bad_request(
            format!("File size exceeds maximum allowed size of {:.1}MB.", max_mb),
            None,
        ));
    }
    if options.min_file_size_bytes > 0 && file.length < options.min_file_size_bytes {
        let min_kb = options.min_file_size_bytes as f64 / 1024.0;
        return Err(bad_request(
            format!("File size is below minimum required size of {:.1}KB.", min_kb),
            None,
        ));
    }
    Ok(())
}

/// Extension check against `allowed_image_extensions`. No file passes through.
pub fn validate_image_extension(file: Option<&UploadedFile>, options: &FileUploadOptions) -> Result<(), Outcome> {
    let Some(file) = file else {
        return Ok(());
    };
    match file.extension() {
        Some(ext) if options.allowed_image_extensions.contains(&ext) => Ok(()),
        _ => {
            let allowed = options
                .allowed_image_extensions
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Err(bad_request(
                format!("Invalid file extension. Only {} are allowed.", allowed),
                None,
            ))
        }
    }
}

/// Field-level validation of a request body. Empty map means valid.
pub trait Validate {
    fn validate(&self) -> BTreeMap<String, Vec<String>>;
}

/// 400 with every field message when `request` is invalid.
pub fn validate_request<T: Validate>(request: &T) -> Result<(), Outcome> {
    let errors = request.validate();
    if errors.values().all(Vec::is_empty) {
        return Ok(());
    }
    let messages = errors.into_values().flatten().collect();
    Err(bad_request("Validation failed", Some(messages)))
}

/// Translate a handler error into the response envelope. Internal errors log at error level.
pub fn error_outcome(err: &DomainError) -> Outcome {
    match err {
        DomainError::Internal { .. } => tracing::error!(error = %err, "unhandled error occurred"),
        _ => tracing::warn!(error = %err, code = err.code().as_u16(), "API error occurred"),
    }
    let (status, body) = ApiResponse::<()>::from_domain_error(err);
    Outcome::json(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(outcome: &Outcome) -> serde_json::Value {
        serde_json::from_slice(&outcome.body).unwrap()
    }

    #[test]
    fn upload_requires_a_file() {
        let err = validate_upload(None, &FileUploadOptions::default()).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(body(&err)["message"], "No file was uploaded.");
    }

    #[test]
    fn upload_size_limits() {
        let mut options = FileUploadOptions::default();
        options.min_file_size_bytes = 2048;

        let big = UploadedFile::new("a.png", 6 * 1024 * 1024);
        let err = validate_upload(Some(&big), &options).unwrap_err();
        assert_eq!(body(&err)["message"], "File size exceeds maximum allowed size of 5.0MB.");

        let small = UploadedFile::new("a.png", 10);
        let err = validate_upload(Some(&small), &options).unwrap_err();
        assert_eq!(body(&err)["message"], "File size is below minimum required size of 2.0KB.");

        assert!(validate_upload(Some(&UploadedFile::new("a.png", 4096)), &options).is_ok());
    }

    #[test]
    fn image_extension_is_case_insensitive() {
        let options = FileUploadOptions::default();
        assert!(validate_image_extension(Some(&UploadedFile::new("Photo.JPG", 1)), &options).is_ok());
        assert!(validate_image_extension(None, &options).is_ok());

        let err = validate_image_extension(Some(&UploadedFile::new("notes.txt", 1)), &options).unwrap_err();
        assert_eq!(
            body(&err)["message"],
            "Invalid file extension. Only .jpeg, .jpg, .png, .webp are allowed."
        );
        assert!(validate_image_extension(Some(&UploadedFile::new("noext", 1)), &options).is_err());
    }

    struct SignUp {
        email: String,
    }

    impl Validate for SignUp {
        fn validate(&self) -> BTreeMap<String, Vec<String>> {
            let mut errors = BTreeMap::new();
            if !self.email.contains('@') {
                errors.insert("email".to_string(), vec!["Email is invalid".to_string()]);
            }
            errors
        }
    }

    #[test]
    fn request_validation_lists_messages() {
        assert!(validate_request(&SignUp { email: "a@b.c".into() }).is_ok());
        let err = validate_request(&SignUp { email: "nope".into() }).unwrap_err();
        let json = body(&err);
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["errors"][0], "Email is invalid");
    }

    #[test]
    fn error_outcome_uses_status_of_error() {
        let outcome = error_outcome(&DomainError::not_found("User", 7));
        assert_eq!(outcome.status, StatusCode::NOT_FOUND);
        assert_eq!(body(&outcome)["metadata"]["resourceId"], "7");
    }
}
