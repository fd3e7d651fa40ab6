//! HTTP clients for the two upstream platforms: OAuth2 authorization-code
//! exchange, the EC-CUBE GraphQL API, and the Mautic REST API.

pub mod eccube;
pub mod mautic;
pub mod oauth;

pub use eccube::{EcCubeClient, EcCubeError, CUSTOMER_FIELDS};
pub use mautic::{MauticClient, MauticError};
pub use oauth::{OAuthClient, OAuthClientConfig, OAuthError, TokenResponse};
