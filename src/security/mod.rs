//! Operator authentication and device host policy

pub mod auth;
pub mod hosts;

pub use auth::{
    AuthConfig, AuthMode, Authenticator, HostAuthenticator, Operator, OperatorAuth,
    StaticAuthenticator,
};
pub use hosts::HostPolicy;
