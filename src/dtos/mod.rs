pub mod offerdtos;
pub mod propertydtos;

use serde::Serialize;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Response<T: Serialize> {
    pub status: &'static str,
    pub data: T,
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> Self {
        Response { status: "success", data }
    }
}
