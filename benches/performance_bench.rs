use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sovereign::correlator::{parse_text_results, ExploitFilter};
use sovereign::nmap_parser::{parse_nmap_output, web_ports};
use sovereign::service::ServiceRecord;
use sovereign::whatweb_parser::parse_whatweb_output;

const NMAP_LINES: &[&str] = &[
    "22/tcp   open  ssh        OpenSSH 8.9p1 Ubuntu 3ubuntu0.4 (Ubuntu Linux; protocol 2.0)",
    "80/tcp   open  http       Apache httpd 2.4.52 ((Ubuntu))",
    "3306/tcp open  mysql      MySQL 8.0.35-0ubuntu0.22.04.1",
    "8000/tcp open  http       Werkzeug/2.0.2 Python/3.10.12",
    "8080/tcp open  http-proxy",
    "|_http-title: Did not follow redirect to http://board.htb/",
];

const WHATWEB_LINE: &str = "http://10.10.11.20:80 [200 OK] Apache[2.4.52], Country[RESERVED][ZZ], HTTPServer[Ubuntu Linux][Apache/2.4.52 (Ubuntu)], IP[10.10.11.20], JQuery[3.4.1], PHP[7.4.3], RedirectLocation[http://board.htb/], Title[Board]";

fn nmap_output(hosts: usize) -> String {
    let mut raw = String::new();
    for i in 0..hosts {
        raw.push_str(&format!("Nmap scan report for 10.10.{}.{}\n", i / 250, i % 250));
        for line in NMAP_LINES {
            raw.push_str(line);
            raw.push('\n');
        }
    }
    raw
}

fn nmap_parser_benchmark(c: &mut Criterion) {
    let raw = nmap_output(200);

    c.bench_function("nmap_parse_services", |b| {
        b.iter(|| parse_nmap_output(black_box(&raw)))
    });

    c.bench_function("nmap_web_ports", |b| {
        b.iter(|| web_ports(black_box(&raw)))
    });
}

fn whatweb_parser_benchmark(c: &mut Criterion) {
    let raw: String = (0..500).map(|_| format!("{}\n", WHATWEB_LINE)).collect();

    c.bench_function("whatweb_parse", |b| {
        b.iter(|| parse_whatweb_output(black_box(&raw)))
    });
}

fn correlation_filter_benchmark(c: &mut Criterion) {
    let service = ServiceRecord::parse("apache 2.4.49").unwrap();
    let filter = ExploitFilter::for_service(&service).unwrap();
    let mut table = String::from(" Exploit Title | Path\n");
    for i in 0..1000 {
        table.push_str(&format!("Apache HTTP Server 2.4.{} - Path Traversal | multiple/webapps/{}.sh\n", i % 60, 50000 + i));
    }

    c.bench_function("searchsploit_text_filter", |b| {
        b.iter(|| {
            parse_text_results(black_box(&table))
                .into_iter()
                .filter(|m| filter.retains(&m.title))
                .count()
        })
    });
}

criterion_group!(
    benches,
    nmap_parser_benchmark,
    whatweb_parser_benchmark,
    correlation_filter_benchmark
);
criterion_main!(benches);
