//! Request and response types the client exchanges with servers.
//!
//! - **Headers** ([`HeaderCollection`]): case-insensitive, order-preserving,
//!   with repeated values joined by a configurable separator
//! - **Requests** (`request`): [`RequestBuilder`] snapshots into [`Request`]s
//!   whose head is serialized up front
//! - **Responses** (`response`): [`Response`] pairs the parsed [`ResponseHead`]
//!   with a lazily read [`body::BodyReader`]
//! - **Errors** ([`HttpError`]): every failure the client can report, including
//!   [`TransferError`] for unsuccessful statuses

mod header;
pub use header::DEFAULT_SEPARATOR;
pub use header::HeaderCollection;

mod request;
pub use request::Request;
pub use request::RequestBody;
pub use request::RequestBuilder;
pub use request::RequestHead;

mod response;
pub use response::Response;
pub use response::ResponseHead;
pub use response::StatusClass;

mod error;
pub use error::HttpError;
pub use error::TransferError;

pub mod body;
