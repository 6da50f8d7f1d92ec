/// JSONレスポンスとリクエスト解析の共通処理
pub mod response;

/// hyperによるHTTP/1サーバー
pub mod server;

pub use response::{
    error_response, json_response, method_not_allowed, not_found, parse_query, read_json_body,
};
pub use server::{serve, shutdown_signal};
