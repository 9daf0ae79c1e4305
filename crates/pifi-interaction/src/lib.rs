//! Client side of the PiFi backend.
//!
//! Only the endpoints the chat and upload flows depend on are wrapped here.

mod backend_client;

pub use backend_client::{AskRequest, AskResponse, BackendClient, StatusResponse, UploadResponse};
