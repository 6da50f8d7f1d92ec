/// 環境変数・ログ設定
pub mod environment;

/// 起動時の初期化処理
pub mod initialization;

pub use environment::{
    fetch_config_path, get_database_filename, get_environment, initialize_logging_system,
    load_environment_variables, Environment, EnvironmentConfig, LogOutput, ServerConfig,
};
pub use initialization::{initialize_application, log_initialization_complete, InitializationResult};
