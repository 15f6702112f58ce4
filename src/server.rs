use crate::{engine::Catalog, sql::plan_and_exec};
use anyhow::Result;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpListener,
};
use tracing::{error, info, warn};

const GREETING: &[u8] = b"flatdb ready. One statement per line, 'exit' to quit.\n";

/// Runs a line-oriented statement session.
///
/// ## Protocol
/// - One statement per line; a trailing `;` is optional
/// - Blank lines are ignored
/// - `exit` or `quit` ends the session
/// - Results are written back as text: `INSERT 1 (pk N)`, `DELETE n`, or a
///   JSON result set for SELECT
/// - Failures are written as `ERROR: message` and the session continues
///
/// Statements run on the blocking pool because table operations do
/// synchronous file I/O and may wait on a table lock.
///
/// ## Example
/// ```text
/// > INSERT INTO users ('ann', 30)
/// INSERT 1 (pk 1)
/// > SELECT name FROM users WHERE age > 18
/// { "columns": ["name"], "rows": [["ann"]] }
/// > exit
/// bye
/// ```
pub async fn run_session<R, W>(catalog: Arc<Catalog>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(GREETING).await?;
    writer.flush().await?;

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let stmt = line.trim();
        if stmt.is_empty() {
            continue;
        }
        if is_exit(stmt) {
            writer.write_all(b"bye\n").await?;
            writer.flush().await?;
            break;
        }

        let catalog = catalog.clone();
        let sql = stmt.to_string();
        let result = tokio::task::spawn_blocking(move || plan_and_exec(&catalog, &sql)).await?;

        let reply = match result {
            Ok(out) => format!("{}\n", out),
            Err(e) => {
                warn!(error = %e, statement = stmt, "statement failed");
                format!("ERROR: {}\n", e)
            }
        };
        writer.write_all(reply.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn is_exit(stmt: &str) -> bool {
    let word = stmt.trim_end_matches(';').trim();
    word.eq_ignore_ascii_case("exit") || word.eq_ignore_ascii_case("quit")
}

/// Serves the session protocol over TCP, one task per client.
///
/// ## Arguments
/// * `catalog` - Shared catalog (Arc for multi-threading)
/// * `addr` - TCP bind address (e.g., "127.0.0.1:54330")
///
/// ## Returns
/// * `Err(_)` - Binding or accept failure; never returns `Ok` in normal operation
pub async fn serve(catalog: Arc<Catalog>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    serve_listener(catalog, listener).await
}

/// Accept loop over an already bound listener.
pub async fn serve_listener(catalog: Arc<Catalog>, listener: TcpListener) -> Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let catalog = catalog.clone();
        info!(?peer, "client connected");

        tokio::spawn(async move {
            let (r, w) = socket.into_split();
            if let Err(e) = run_session(catalog, BufReader::new(r), w).await {
                error!(?peer, error = %e, "session error");
            }
            info!(?peer, "client disconnected");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, BufWriter};
    use tokio::net::TcpStream;

    fn catalog(dir: &TempDir) -> Arc<Catalog> {
        let schema = SchemaConfig::new("s", 10).with_table("users", &["name", "age"]);
        Arc::new(Catalog::open(dir.path(), &schema).unwrap())
    }

    async fn session(catalog: Arc<Catalog>, input: &str) -> String {
        let mut out = Vec::new();
        run_session(catalog, input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_session_runs_statements() {
        let tmp = TempDir::new().unwrap();
        let output = session(
            catalog(&tmp),
            "INSERT INTO users (ann, 30);\n\nSELECT name FROM users WHERE age > 18\nexit\nINSERT INTO users (late, 1)\n",
        )
        .await;

        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("flatdb ready"));
        assert_eq!(lines[1], "INSERT 1 (pk 1)");
        assert!(output.contains("\"ann\""));
        assert_eq!(*lines.last().unwrap(), "bye");
        assert!(!output.contains("pk 2"));
    }

    #[tokio::test]
    async fn test_session_survives_errors() {
        let tmp = TempDir::new().unwrap();
        let output = session(
            catalog(&tmp),
            "FROB users\nSELECT * FROM nobody\nINSERT INTO users (bob, x)\nSELECT name FROM users WHERE age < 5\nSELECT name FROM users\n",
        )
        .await;

        assert!(output.contains("ERROR: unknown command: FROB"));
        assert!(output.contains("ERROR: table not found: nobody"));
        assert!(output.contains("ERROR: cannot compare age"));
        assert!(output.contains("\"bob\""));
    }

    #[tokio::test]
    async fn test_exit_flushes_goodbye() {
        let tmp = TempDir::new().unwrap();
        let mut out = BufWriter::new(Vec::new());
        run_session(catalog(&tmp), &b"exit\n"[..], &mut out)
            .await
            .unwrap();

        // Nothing is left sitting in the buffer once the session returns.
        let written = String::from_utf8(out.get_ref().clone()).unwrap();
        assert!(written.ends_with("bye\n"));
    }

    #[tokio::test]
    async fn test_serve_over_tcp() {
        let tmp = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_listener(catalog(&tmp), listener));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"INSERT INTO users ('ann', 30)\nexit\n")
            .await
            .unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();

        let lines: Vec<&str> = reply.lines().collect();
        assert!(lines[0].starts_with("flatdb ready"));
        assert_eq!(lines[1..], ["INSERT 1 (pk 1)", "bye"]);

        server.abort();
    }

    #[test]
    fn test_exit_sentinel() {
        assert!(is_exit("exit"));
        assert!(is_exit("QUIT;"));
        assert!(!is_exit("exits"));
    }
}
