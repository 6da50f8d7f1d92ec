use crate::shared::config::environment::{get_environment, Environment, ServerConfig};
use crate::shared::database::initialize_database;
use crate::shared::errors::AppResult;
use rusqlite::Connection;
use std::path::PathBuf;

/// アプリケーション初期化の結果を表す構造体
#[derive(Debug)]
pub struct InitializationResult {
    /// 初回起動かどうか
    pub is_first_run: bool,
    /// データベースファイルのパス
    pub database_path: PathBuf,
    /// 実行環境
    pub environment: Environment,
}

/// アプリケーションの初期化を実行する
///
/// # 引数
/// * `config` - サーバー設定
///
/// # 戻り値
/// データベース接続と初期化結果、または失敗時はエラー
///
/// # 処理内容
/// 1. 初回起動の判定
/// 2. データベースファイルの初期化
pub fn initialize_application(
    config: &ServerConfig,
) -> AppResult<(Connection, InitializationResult)> {
    let environment = get_environment();
    let database_path = config.database_path.clone();

    // 初回起動かどうかを判定（データベースファイルの存在で判定）
    let is_first_run = !database_path.exists();

    if is_first_run {
        log_first_run_initialization(&environment, &database_path);
    }

    let conn = initialize_database(&database_path)?;

    Ok((
        conn,
        InitializationResult {
            is_first_run,
            database_path,
            environment,
        },
    ))
}

/// 初回起動時の初期化ログを出力する
fn log_first_run_initialization(environment: &Environment, database_path: &PathBuf) {
    log::info!("=== アプリケーション初回起動 ===");
    log::info!("実行環境: {environment:?}");
    log::info!("データベースファイル: {database_path:?}");
}

/// 初期化完了ログを出力する
///
/// # 引数
/// * `result` - 初期化結果
pub fn log_initialization_complete(result: &InitializationResult) {
    if result.is_first_run {
        log::info!("初回起動の初期化が正常に完了しました");
    } else {
        log::info!("アプリケーション起動完了（既存データベースを使用）");
    }
    log::info!("環境: {:?}", result.environment);
    log::info!("データベース: {:?}", result.database_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::environment::LogOutput;
    use tempfile::TempDir;

    fn config_for(database_path: PathBuf) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path,
            log_output: LogOutput::Stderr,
        }
    }

    #[test]
    fn test_initialize_application_first_run() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let (_conn, result) = initialize_application(&config_for(db_path.clone())).unwrap();

        assert!(result.is_first_run);
        assert_eq!(result.database_path, db_path);
        assert!(db_path.exists());
    }

    #[test]
    fn test_initialize_application_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let _ = initialize_application(&config_for(db_path.clone())).unwrap();
        }

        let (_conn, result) = initialize_application(&config_for(db_path)).unwrap();
        assert!(!result.is_first_run);
        log_initialization_complete(&result);
    }
}
