use tokio::net::TcpListener;

/// `PORT` (default 5984) and optional `MOCK_COUCH_ADMIN=user:password`.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "5984".to_string());
    let addr = format!("127.0.0.1:{port}");
    let router = match std::env::var("MOCK_COUCH_ADMIN") {
        Ok(admin) => {
            let (username, password) = admin.split_once(':').unwrap_or((admin.as_str(), ""));
            mock_couch::app_with_admin(username, password)
        }
        Err(_) => mock_couch::app(),
    };
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr}");
    mock_couch::serve(listener, router).await
}
