// nefila-api: Async client for Fortinet Security Fabric device APIs

pub mod auth;
pub mod client;
pub mod error;
pub mod family;
pub mod fortigate;
pub mod session;
pub mod transport;

pub use auth::{AuthArtifacts, AuthStrategy, BearerToken, FormLogin, LoginEncoding};
pub use client::{DeviceClient, DeviceClientBuilder};
pub use error::{Error, ErrorKind};
pub use family::DeviceFamily;
pub use fortigate::{FortiGate, StatusSummary};
pub use session::Session;
pub use transport::{TlsMode, TransportConfig};

pub use nefila_config::{CredentialStore, Credentials, Settings};
