//! Unit tests for chart download, verification and publishing.

use super::*;
use crate::test_utils::InMemoryChartRepository;
use rstest::{fixture, rstest};

const SOURCE: &str = "https://charts.src.test";
const DESTINATION: &str = "https://charts.dst.test";
const ARCHIVE: &[u8] = b"web chart archive bytes";

#[fixture]
fn entry() -> ChartEntry {
    ChartEntry::new("web", "1.0", Sha256Digest::of_bytes(ARCHIVE))
}

#[fixture]
fn repository() -> InMemoryChartRepository {
    InMemoryChartRepository::new().with_archive("https://charts.src.test/web-1.0.tgz", ARCHIVE)
}

#[rstest]
fn verified_archive_is_published_unchanged(entry: ChartEntry, repository: InMemoryChartRepository) {
    ChartMirror::new(&repository, &repository)
        .mirror(SOURCE, Some(DESTINATION), &entry)
        .expect("chart mirrors");

    assert_eq!(
        repository.fetched(),
        vec!["https://charts.src.test/web-1.0.tgz".to_owned()]
    );
    assert_eq!(
        repository.published(),
        vec![(
            "https://charts.dst.test/web-1.0.tgz".to_owned(),
            ARCHIVE.to_vec()
        )]
    );
}

#[rstest]
fn digest_mismatch_is_rejected_before_publish(repository: InMemoryChartRepository) {
    let entry = ChartEntry::new("web", "1.0", Sha256Digest::of_bytes(b"something else"));
    let mut publisher = MockChartPublisher::new();
    publisher.expect_publish().never();

    let err = ChartMirror::new(&repository, &publisher)
        .mirror(SOURCE, Some(DESTINATION), &entry)
        .expect_err("digest differs");

    let integrity = match err {
        ChartError::Integrity(integrity) => integrity,
        other => panic!("expected integrity error, got {other:?}"),
    };
    assert_eq!(integrity.chart, "web 1.0");
    assert_eq!(integrity.expected, entry.digest().to_string());
    assert_eq!(integrity.actual, Sha256Digest::of_bytes(ARCHIVE).to_string());
}

#[rstest]
fn missing_archive_reports_not_found(entry: ChartEntry) {
    let repository = InMemoryChartRepository::new();

    let err = ChartMirror::new(&repository, &repository)
        .mirror(SOURCE, Some(DESTINATION), &entry)
        .expect_err("archive missing");

    assert!(err.is_not_found());
    assert!(err.to_string().contains("not found"));
    assert!(repository.published().is_empty());
}

#[rstest]
fn without_destination_chart_is_only_verified(
    entry: ChartEntry,
    repository: InMemoryChartRepository,
) {
    ChartMirror::new(&repository, &repository)
        .mirror(SOURCE, None, &entry)
        .expect("chart verifies");

    assert_eq!(repository.fetched().len(), 1);
    assert!(repository.published().is_empty());
}

#[rstest]
fn rejected_upload_is_a_transfer_error(entry: ChartEntry, repository: InMemoryChartRepository) {
    let mut publisher = MockChartPublisher::new();
    publisher.expect_publish().times(1).returning(|url, _| {
        Err(FetchError::Http {
            url: url.to_owned(),
            reason: "http status: 409".to_owned(),
        })
    });

    let err = ChartMirror::new(&repository, &publisher)
        .mirror(SOURCE, Some(DESTINATION), &entry)
        .expect_err("upload rejected");

    assert!(matches!(
        err,
        ChartError::Transfer(TransferError::Chart { .. })
    ));
    assert!(err.to_string().contains("409"));
}

#[rstest]
fn transport_failure_is_a_fetch_error(entry: ChartEntry) {
    let mut fetcher = MockChartFetcher::new();
    fetcher.expect_fetch().times(1).returning(|url| {
        Err(FetchError::Http {
            url: url.to_owned(),
            reason: "connection refused".to_owned(),
        })
    });
    let mut publisher = MockChartPublisher::new();
    publisher.expect_publish().never();

    let err = ChartMirror::new(&fetcher, &publisher)
        .mirror(SOURCE, Some(DESTINATION), &entry)
        .expect_err("fetch fails");

    assert!(!err.is_not_found());
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn digesting_writer_hashes_and_forwards_bytes() {
    let mut sink = Vec::new();
    let mut writer = DigestingWriter::new(&mut sink);
    writer.write_all(b"hel").expect("write");
    writer.write_all(b"lo").expect("write");
    let digest = writer.finish().expect("finish");

    assert_eq!(digest, Sha256Digest::of_bytes(b"hello"));
    assert_eq!(sink, b"hello");
}

#[rstest]
#[case::not_found(404, true)]
#[case::server_error(500, false)]
#[case::forbidden(403, false)]
fn ureq_status_codes_map_to_fetch_errors(#[case] status: u16, #[case] not_found: bool) {
    let mapped = map_ureq_error("https://charts.src.test/web-1.0.tgz", &ureq::Error::StatusCode(status));
    assert_eq!(matches!(mapped, FetchError::NotFound { .. }), not_found);
}

/// Serves one HTTP/1.1 response from a local listener and returns its base URL.
fn serve_once(status_line: &'static str, body: &'static str) -> (String, std::thread::JoinHandle<()>) {
    use std::io::BufRead;
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let address = listener.local_addr().expect("listener address");
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept connection");
        let mut reader = io::BufReader::new(stream.try_clone().expect("clone stream"));
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line).expect("read request");
            if read == 0 || line == "\r\n" {
                break;
            }
        }
        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .expect("write response");
    });
    (format!("http://{address}"), handle)
}

fn hello_entry() -> ChartEntry {
    ChartEntry::new("web", "1.0", Sha256Digest::of_bytes(b"hello"))
}

#[rstest]
#[case::non_authoritative("203 Non-Authoritative Information", "203")]
#[case::partial_content("206 Partial Content", "206")]
#[case::no_content("204 No Content", "204")]
fn http_client_rejects_success_statuses_other_than_ok(
    #[case] status_line: &'static str,
    #[case] code: &str,
) {
    let body = if code == "204" { "" } else { "hello" };
    let (base, server) = serve_once(status_line, body);
    let client = HttpChartClient::new(Duration::from_secs(5));

    let err = ChartMirror::new(&client, &client)
        .mirror(&base, None, &hello_entry())
        .expect_err("only 200 is accepted");
    server.join().expect("server thread");

    assert!(matches!(
        err,
        ChartError::Fetch {
            source: FetchError::Http { .. },
            ..
        }
    ));
    assert!(err.to_string().contains(code), "{err}");
}

#[test]
fn http_client_accepts_ok_response_with_matching_digest() {
    let (base, server) = serve_once("200 OK", "hello");
    let client = HttpChartClient::new(Duration::from_secs(5));

    ChartMirror::new(&client, &client)
        .mirror(&base, None, &hello_entry())
        .expect("chart verifies");
    server.join().expect("server thread");
}

#[test]
fn http_client_reports_missing_archive_as_not_found() {
    let (base, server) = serve_once("404 Not Found", "missing");
    let client = HttpChartClient::new(Duration::from_secs(5));

    let err = ChartMirror::new(&client, &client)
        .mirror(&base, None, &hello_entry())
        .expect_err("archive missing");
    server.join().expect("server thread");

    assert!(err.is_not_found());
    assert!(err.to_string().contains("not found"));
}
