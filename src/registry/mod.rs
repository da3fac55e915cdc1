//! Application registry: request validation, credential assignment, token
//! defaults and the lifecycle orchestrator.

pub(crate) mod compensation;
pub mod credentials;
pub mod declarative;
pub mod flows;
pub mod service;
pub mod token_config;
pub mod types;
pub mod validation;

pub use credentials::{
    CredentialGenerator, RandomCredentialGenerator, SecretHasher, Sha256SecretHasher,
};
pub use declarative::load_applications;
pub use flows::{FlowRegistry, FlowSettings, StaticFlowRegistry};
pub use service::{ApplicationService, PreparedApplication, RegistrySettings};
pub use token_config::TokenDefaults;
pub use types::*;
pub use validation::CertificateSpec;
