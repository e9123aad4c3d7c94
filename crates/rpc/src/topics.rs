//! Topic constants for request/reply routing.
//!
//! Requests follow `svc.<service>.<operation>`. Replies reuse the request
//! topic with [`REPLY_SUFFIX`] or [`ERROR_SUFFIX`] appended.

// ── Ingestion service ─────────────────────────────────────────────────────

/// Trigger one ingestion run and wait for it to finish.
pub const PARSE_RUN: &str = "svc.parse.run";

// ── Record service ────────────────────────────────────────────────────────

pub const POST_LIST: &str = "svc.post.list";
pub const POST_GET: &str = "svc.post.get";
pub const POST_UPDATE: &str = "svc.post.update";
pub const POST_DELETE: &str = "svc.post.delete";

// ── Control ───────────────────────────────────────────────────────────────

/// Liveness probe answered by every service runner.
pub const PING: &str = "svc.ping";

/// Sent by a client that stopped waiting; aborts the matching in-flight handler.
pub const CANCEL: &str = "rpc.cancel";

pub const REPLY_SUFFIX: &str = ".reply";
pub const ERROR_SUFFIX: &str = ".error";
