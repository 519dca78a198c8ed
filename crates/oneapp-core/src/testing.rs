// SPDX-License-Identifier: Apache-2.0

//! Local fake servers for tests.

use axum::Router;

/// Serves `app` on an ephemeral loopback port and returns its base URL.
pub(crate) async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind ephemeral port");
    let addr = listener.local_addr().expect("should have local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake server failed");
    });
    format!("http://{addr}")
}
