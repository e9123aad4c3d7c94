//! CRUD over stored records, exposed as the `post` RPC service.

pub mod service;

pub use service::RecordService;
