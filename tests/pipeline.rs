// End-to-end: raw lines through the parser into the collector.

use ingress_tally::metrics::TimeoutCounter;
use ingress_tally::{GroupBy, LineParser, MetricCollector};

const ACCESS_LINE: &str = r#"192.168.1.10 - - [2/Jan/2006:15:04:05 +0000] "GET /foo/bar?x=1 HTTP/1.1" 200 512 "-" "curl/8.0.1" 321 0.500 [default-backend-http] [] 10.0.0.5:8080 512 0.498 200 5f3a2b"#;

const ERROR_LINE: &str = r#"2006/01/02 15:04:05 [error] 31#31: *42 upstream timed out (110: Connection timed out) while reading response header from upstream, client: 10.0.0.5, server: example.com, request: "GET /foo/bar HTTP/1.1", upstream: "http://10.0.0.5:8080/foo/bar", host: "example.com""#;

#[test]
fn three_lines_one_path() {
    let parser = LineParser::new().unwrap();
    let mut collector = MetricCollector::new(GroupBy::Path);

    for line in [ACCESS_LINE, ACCESS_LINE, ERROR_LINE] {
        collector.add(&parser.parse(line).unwrap());
    }

    let latencies = &collector.latency_data()["/foo/bar"];
    assert_eq!(latencies.len(), 2);
    assert!(latencies.iter().all(|sample| sample.latency_secs == 0.5));

    assert_eq!(collector.response_data()["/foo/bar"][&200], 2);
    assert_eq!(collector.response_data()["/foo/bar"][&504], 1);
    assert_eq!(
        collector.timeout_data()["/foo/bar"],
        TimeoutCounter { count: 1, total: 3 }
    );
}

#[test]
fn unmatched_lines_leave_the_aggregates_untouched() {
    let parser = LineParser::new().unwrap();
    let mut collector = MetricCollector::new(GroupBy::Path);

    collector.add(&parser.parse(ACCESS_LINE).unwrap());
    let before = collector.summarize();

    for line in ["garbage", "{\"not\": \"an access log\"}", "   "] {
        if let Ok(record) = parser.parse(line) {
            collector.add(&record);
        }
    }

    assert_eq!(before, collector.summarize());
}

#[test]
fn grouping_by_upstream_buckets_by_address() {
    let parser = LineParser::new().unwrap();
    let mut collector = MetricCollector::new(GroupBy::UpstreamAddr);

    collector.add(&parser.parse(ACCESS_LINE).unwrap());
    collector.add(&parser.parse(ERROR_LINE).unwrap());

    assert_eq!(
        collector.timeout_data()["10.0.0.5:8080"],
        TimeoutCounter { count: 0, total: 1 }
    );
    assert_eq!(
        collector.timeout_data()["10.0.0.5"],
        TimeoutCounter { count: 1, total: 1 }
    );
}
