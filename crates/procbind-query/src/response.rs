//! Uniform result envelope for CRUD operations

use procbind_core::EntityList;
use serde::{Deserialize, Serialize};

/// Outcome of one CRUD operation
///
/// On failure `data` holds `D::default()` and `message` carries the cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<D> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub data: D,
}

/// Response of save/delete/update paths
pub type WriteResponse = Response<()>;

/// Response of a single-entity read
pub type EntityResponse<E> = Response<Option<E>>;

/// Response of a list read
pub type ListResponse<E> = Response<EntityList<E>>;

impl<D: Default> Response<D> {
    pub fn ok(data: D) -> Self {
        Self {
            success: true,
            message: String::new(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: D::default(),
        }
    }
}

impl<D> Response<D> {
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The payload on success, the failure message otherwise
    pub fn into_result(self) -> std::result::Result<D, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.message)
        }
    }

    pub fn map<U>(self, f: impl FnOnce(D) -> U) -> Response<U> {
        Response {
            success: self.success,
            message: self.message,
            data: f(self.data),
        }
    }
}

impl Default for Response<()> {
    fn default() -> Self {
        Self::ok(())
    }
}
