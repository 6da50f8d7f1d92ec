use crate::shared::errors::{AppError, AppResult};
use std::fs::OpenOptions;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// デフォルトの待ち受けホスト
const DEFAULT_HOST: &str = "0.0.0.0";

/// デフォルトの待ち受けポート
const DEFAULT_PORT: u16 = 8080;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

impl Environment {
    fn from_name(name: &str) -> Self {
        match name {
            "production" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: String,
    /// デバッグモードの有効/無効
    pub debug_mode: bool,
    /// ログレベル
    pub log_level: String,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    ///
    /// # 戻り値
    /// 環境設定
    pub fn from_env() -> Self {
        let environment = get_environment();
        let debug_mode = environment == Environment::Development;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if debug_mode {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        Self {
            environment: format!("{environment:?}").to_lowercase(),
            debug_mode,
            log_level,
        }
    }

    /// ログレベル文字列を`LevelFilter`に変換する
    ///
    /// 不明な値は`Info`として扱う。
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level.to_lowercase().as_str() {
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

/// 現在の実行環境を判定する
///
/// # 戻り値
/// 現在の実行環境（Development または Production）
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = Environment::from_name(&env_var);
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_subscriptions.db"
/// - プロダクション環境: "subscriptions.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_subscriptions.db",
        Environment::Production => "subscriptions.db",
    }
}

/// コマンドライン引数または CONFIG_PATH から追加の設定ファイルパスを取得する
///
/// `--config <path>` と `--config=<path>` の両方を受け付ける。
///
/// # 引数
/// * `args` - プログラム名を除いたコマンドライン引数
///
/// # 戻り値
/// 設定ファイルのパス（指定がない場合はNone）
pub fn fetch_config_path<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return Some(PathBuf::from(path));
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }

    std::env::var("CONFIG_PATH")
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// 環境に応じた.envファイルを読み込む
///
/// # 引数
/// * `config_path` - 明示的に指定された設定ファイル（最優先で読み込む）
///
/// # 処理内容
/// 1. 明示的に指定された設定ファイルを読み込み
/// 2. 環境に応じた.envファイルを読み込み
/// 3. フォールバック処理
pub fn load_environment_variables(config_path: Option<&PathBuf>) -> AppResult<()> {
    if let Some(path) = config_path {
        // 明示指定されたファイルが読めない場合は起動を中止する
        dotenv::from_path(path).map_err(|e| {
            AppError::configuration(format!("設定ファイル {path:?} を読み込めません: {e}"))
        })?;
        log::info!("設定ファイルを読み込みました: {path:?}");
    }

    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    let env_file = match environment.as_str() {
        "production" => ".env.production",
        _ => ".env",
    };

    log::info!("環境: {environment}, 読み込み対象: {env_file}");

    match dotenv::from_filename(env_file) {
        Ok(_) => {
            log::info!("{env_file}ファイルを読み込みました");
        }
        Err(_) => {
            // 環境固有のファイルがない場合は、デフォルトの.envを試行
            if env_file != ".env" && dotenv::dotenv().is_ok() {
                log::warn!("{env_file}が見つからないため、デフォルトの.envファイルを読み込みました");
            } else {
                log::warn!("環境変数ファイルが見つかりません。直接設定された環境変数を使用します。");
            }
        }
    }

    Ok(())
}

/// ログの出力先
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutput {
    /// 標準出力
    Stdout,
    /// 標準エラー出力
    Stderr,
    /// ファイル（追記）
    File(PathBuf),
}

impl LogOutput {
    /// LOG_OUTPUT の値を解析する
    ///
    /// `stdout`・`stderr` 以外の値はファイルパスとして扱う。
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "" => Err(AppError::configuration("LOG_OUTPUT が空です")),
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            path => Ok(LogOutput::File(PathBuf::from(path))),
        }
    }
}

/// HTTPサーバーとデータベースの設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 待ち受けホスト
    pub host: String,
    /// 待ち受けポート
    pub port: u16,
    /// SQLiteデータベースファイルのパス
    pub database_path: PathBuf,
    /// ログの出力先
    pub log_output: LogOutput,
}

impl ServerConfig {
    /// 環境変数からサーバー設定を読み込む
    ///
    /// # 戻り値
    /// サーバー設定、または値が不正な場合は設定エラー
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(get_environment(), |key| std::env::var(key).ok())
    }

    /// 任意の取得関数から設定を組み立てる
    ///
    /// # 引数
    /// * `environment` - 実行環境（データベースファイル名の既定値に使用）
    /// * `lookup` - キーに対応する値を返す関数
    pub fn from_lookup<F>(environment: Environment, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        host.parse::<IpAddr>()
            .map_err(|e| AppError::configuration(format!("SERVER_HOST が不正です: {host} ({e})")))?;

        let port = match lookup("SERVER_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                AppError::configuration(format!("SERVER_PORT が不正です: {raw} ({e})"))
            })?,
            None => DEFAULT_PORT,
        };

        let database_path = lookup("DATABASE_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(get_database_filename(environment)));

        let log_output = match lookup("LOG_OUTPUT") {
            Some(raw) => LogOutput::parse(&raw)?,
            None => LogOutput::Stdout,
        };

        Ok(Self {
            host,
            port,
            database_path,
            log_output,
        })
    }

    /// 待ち受けアドレスを取得
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip = self.host.parse::<IpAddr>().map_err(|e| {
            AppError::configuration(format!("SERVER_HOST が不正です: {} ({e})", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// ログシステムを初期化する
///
/// # 引数
/// * `output` - ログの出力先
///
/// # 処理内容
/// 1. 環境設定を取得
/// 2. ログレベルと出力先を設定
/// 3. env_loggerを初期化
pub fn initialize_logging_system(output: &LogOutput) -> AppResult<()> {
    let env_config = EnvironmentConfig::from_env();

    let target = match output {
        LogOutput::Stdout => env_logger::Target::Stdout,
        LogOutput::Stderr => env_logger::Target::Stderr,
        LogOutput::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            env_logger::Target::Pipe(Box::new(file))
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(env_config.level_filter())
        .target(target)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::configuration(format!("ログシステムの初期化に失敗: {e}")))?;

    log::info!(
        "ログシステムを初期化しました: level={}, environment={}, output={:?}",
        env_config.log_level,
        env_config.environment,
        output
    );

    Ok(())
}
