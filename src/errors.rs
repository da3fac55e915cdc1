//! Standardized error types following the `error-appreg-<domain>-<number>` format.

use thiserror::Error;

/// Whether an error was caused by the caller or by the registry itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Client,
    Server,
}

/// Configuration errors that occur during startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-appreg-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when version information is not available
    #[error("error-appreg-config-2 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-appreg-config-3 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-appreg-config-4 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when a numeric setting cannot be parsed
    #[error("error-appreg-config-5 Failed to parse number '{0}': {1}")]
    NumberParsingFailed(String, std::num::ParseIntError),

    /// Error when a backend name is not recognized
    #[error("error-appreg-config-6 Unknown {0} backend: {1}")]
    UnknownBackend(&'static str, String),
}

/// Errors surfaced by the application lifecycle operations.
///
/// Every validation rule has its own variant so callers can map failures to
/// stable client-facing codes.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("error-appreg-application-1 Application name must not be empty")]
    InvalidApplicationName,

    #[error("error-appreg-application-2 Application id must not be empty")]
    InvalidApplicationId,

    #[error("error-appreg-application-3 Client id must not be empty")]
    InvalidClientId,

    #[error("error-appreg-application-4 Application not found")]
    NotFound,

    #[error("error-appreg-application-5 An application with the same name already exists")]
    AlreadyExistsWithName,

    #[error("error-appreg-application-6 An application with the same client id already exists")]
    AlreadyExistsWithClientId,

    #[error("error-appreg-application-7 Invalid inbound auth configuration: {0}")]
    InvalidInboundAuthConfig(String),

    #[error("error-appreg-application-8 Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    #[error("error-appreg-application-9 Redirect URI must not contain a fragment: {0}")]
    RedirectUriWithFragment(String),

    #[error(
        "error-appreg-application-10 authorization_code grant requires at least one redirect URI"
    )]
    AuthorizationCodeMissingRedirectUri,

    #[error("error-appreg-application-11 Invalid grant type: {0}")]
    InvalidGrantType(String),

    #[error("error-appreg-application-12 Invalid response type: {0}")]
    InvalidResponseType(String),

    #[error(
        "error-appreg-application-13 client_credentials grant cannot be combined with response types"
    )]
    ClientCredentialsWithResponseTypes,

    #[error("error-appreg-application-14 authorization_code grant requires the code response type")]
    AuthorizationCodeMissingCodeResponseType,

    #[error("error-appreg-application-15 Invalid token endpoint auth method: {0}")]
    InvalidTokenEndpointAuthMethod(String),

    #[error(
        "error-appreg-application-16 client_credentials grant cannot use the none auth method"
    )]
    ClientCredentialsWithNoneAuth,

    #[error("error-appreg-application-17 jwks and jwks_uri cannot both be provided")]
    JwksConfigurationConflict,

    #[error("error-appreg-application-18 jwks_uri must use https")]
    JwksUriNotHttps,

    #[error("error-appreg-application-19 Invalid jwks_uri: {0}")]
    InvalidJwksUri(String),

    #[error("error-appreg-application-20 Invalid certificate type: {0}")]
    InvalidCertificateType(String),

    #[error("error-appreg-application-21 Certificate value must not be empty")]
    InvalidCertificateValue,

    #[error("error-appreg-application-22 Public clients must use the none auth method")]
    PublicClientInvalidAuthMethod,

    #[error("error-appreg-application-23 Public clients cannot use the client_credentials grant")]
    PublicClientInvalidGrantType,

    #[error("error-appreg-application-24 Public clients cannot have a client secret")]
    PublicClientHasSecret,

    #[error("error-appreg-application-25 Invalid auth flow graph id: {0}")]
    InvalidAuthFlowGraphId(String),

    #[error("error-appreg-application-26 Invalid registration flow graph id: {0}")]
    InvalidRegistrationFlowGraphId(String),

    #[error("error-appreg-application-27 Invalid application URL: {0}")]
    InvalidApplicationUrl(String),

    #[error("error-appreg-application-28 Invalid logo URL: {0}")]
    InvalidLogoUrl(String),

    #[error("error-appreg-application-29 {0}")]
    CertificateClientError(String),

    #[error("error-appreg-application-30 {0}")]
    CertificateServerError(String),

    #[error("error-appreg-application-31 Operation not supported on immutable resource")]
    ImmutableResource,

    #[error("error-appreg-application-32 Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            ApplicationError::CertificateServerError(_) | ApplicationError::Internal(_) => {
                ErrorType::Server
            }
            _ => ErrorType::Client,
        }
    }
}

impl From<StorageError> for ApplicationError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(_) => ApplicationError::NotFound,
            StorageError::DuplicateName(_) => ApplicationError::AlreadyExistsWithName,
            StorageError::DuplicateClientId(_) => ApplicationError::AlreadyExistsWithClientId,
            StorageError::ImmutableResource(_) => ApplicationError::ImmutableResource,
            other => ApplicationError::Internal(other.to_string()),
        }
    }
}

/// Errors reported by a certificate service
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The certificate payload was rejected
    #[error("error-appreg-certificate-1 Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// A certificate already exists for the reference
    #[error("error-appreg-certificate-2 Certificate already exists for {0}")]
    AlreadyExists(String),

    /// No certificate with the given id
    #[error("error-appreg-certificate-3 Certificate not found: {0}")]
    NotFound(String),

    /// The certificate backend failed
    #[error("error-appreg-certificate-4 Certificate service failure: {0}")]
    ServiceFailure(String),
}

impl CertificateError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            CertificateError::ServiceFailure(_) => ErrorType::Server,
            _ => ErrorType::Client,
        }
    }
}

/// Cache backend errors. These are logged by the cache layer and never fail
/// a registry operation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Error when the cache backend cannot be reached
    #[error("error-appreg-cache-1 Cache backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Error when a cached value cannot be encoded or decoded
    #[error("error-appreg-cache-2 Cache serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when a cache command fails
    #[error("error-appreg-cache-3 Cache operation failed: {0}")]
    OperationFailed(String),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-appreg-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when query execution fails
    #[error("error-appreg-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when data serialization fails
    #[error("error-appreg-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when database operation fails
    #[error("error-appreg-storage-4 Database error: {0}")]
    DatabaseError(String),

    /// Error when data validation fails
    #[error("error-appreg-storage-5 Invalid data: {0}")]
    InvalidData(String),

    /// Error when requested resource is not found
    #[error("error-appreg-storage-6 Not found: {0}")]
    NotFound(String),

    /// Unique constraint on the application name
    #[error("error-appreg-storage-7 Duplicate application name: {0}")]
    DuplicateName(String),

    /// Unique constraint on the OAuth client id
    #[error("error-appreg-storage-8 Duplicate client id: {0}")]
    DuplicateClientId(String),

    /// Write attempted against the declarative store
    #[error("error-appreg-storage-9 Operation not supported on immutable resource: {0}")]
    ImmutableResource(String),
}
