pub mod features;
pub mod router;
pub mod shared;

use features::subscriptions::SubscriptionService;
use log::{error, info};
use rusqlite::Connection;
use shared::config::{
    fetch_config_path, initialize_application, initialize_logging_system,
    load_environment_variables, log_initialization_complete, EnvironmentConfig, ServerConfig,
};
use shared::errors::AppResult;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// アプリケーション状態（データベース接続を共有するサービスを保持）
pub struct AppState {
    pub subscriptions: SubscriptionService,
}

impl AppState {
    /// データベース接続からアプリケーション状態を作成する
    pub fn new(conn: Connection) -> Self {
        let db = Arc::new(Mutex::new(conn));
        Self {
            subscriptions: SubscriptionService::new(db),
        }
    }
}

/// サーバーを起動する
///
/// # 引数
/// * `args` - プログラム名を除いたコマンドライン引数
///
/// # 処理内容
/// 1. 設定ファイルと環境変数の読み込み
/// 2. ログシステムの初期化
/// 3. データベースの初期化
/// 4. HTTPサーバーの起動（Ctrl-Cで停止）
pub async fn run<I>(args: I) -> AppResult<()>
where
    I: IntoIterator<Item = String>,
{
    let config_path = fetch_config_path(args);
    load_environment_variables(config_path.as_ref())?;

    let server_config = ServerConfig::from_env()?;
    initialize_logging_system(&server_config.log_output)?;

    info!("アプリケーション初期化を開始します...");
    let env_config = EnvironmentConfig::from_env();
    info!(
        "環境設定: environment={}, debug_mode={}",
        env_config.environment, env_config.debug_mode
    );

    let (conn, init_result) = initialize_application(&server_config).map_err(|e| {
        error!("データベースの初期化に失敗しました: {e}");
        e
    })?;
    log_initialization_complete(&init_result);

    let state = Arc::new(AppState::new(conn));

    let addr = server_config.socket_addr()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("アドレスのバインドに失敗しました: {addr} ({e})");
        e
    })?;

    shared::http::serve(listener, state, shared::http::shutdown_signal()).await?;

    info!("アプリケーションを終了しました");
    Ok(())
}
