use crate::router::handle_request;
use crate::shared::errors::AppResult;
use crate::AppState;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// HTTPサーバーを起動し、停止シグナルを受け取るまで接続を受け付ける
///
/// # 引数
/// * `listener` - バインド済みのTCPリスナー
/// * `state` - アプリケーション状態
/// * `shutdown` - 完了するとサーバーを停止するFuture
///
/// # 戻り値
/// 停止時はOk(())
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    log::info!("HTTPサーバーを開始しました: http://{addr}");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("接続を受け付けました: {peer}");
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            handle_connection(stream, state).await;
                        });
                    }
                    Err(e) => {
                        // ファイルディスクリプタ枯渇などは一時的なため受け付けを続ける
                        log::error!("接続受け入れエラー: {e}");
                    }
                }
            }
            _ = &mut shutdown => {
                log::info!("停止シグナルを受信しました。HTTPサーバーを停止します");
                break;
            }
        }
    }

    Ok(())
}

/// TCP接続を処理する
async fn handle_connection(stream: TcpStream, state: Arc<AppState>) {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        log::error!("HTTP接続処理エラー: {err}");
    }
}

/// Ctrl-Cを待機する
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("シグナルハンドラーの登録に失敗しました: {e}");
        // 停止手段がないため永久に待機する
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::create_tables;
    use rusqlite::Connection;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_serve_health_and_shutdown() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let state = Arc::new(AppState::new(conn));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(listener, state, async move {
            let _ = stop_rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.contains(r#"{"status":"ok"}"#));

        stop_tx.send(()).unwrap();
        assert!(server.await.unwrap().is_ok());
    }
}
