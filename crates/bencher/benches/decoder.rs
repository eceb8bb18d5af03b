use std::hint::black_box;
use std::io::Read;
use std::time::Duration;

use bencher::ResponseFixture;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_client::codec::body::ChunkedDecoder;
use micro_client::codec::{ParserConfig, ResponseParser};
use micro_client::stream::PushbackStream;

static PLAIN_SMALL: ResponseFixture =
    ResponseFixture::small("plain_small", include_bytes!("../resources/response/plain_small.txt"));
static PLAIN_LARGE_HEADER: ResponseFixture =
    ResponseFixture::large("plain_large_header", include_bytes!("../resources/response/plain_large_header.txt"));
static CHUNKED_SMALL: ResponseFixture =
    ResponseFixture::small("chunked_small", include_bytes!("../resources/response/chunked_small.txt"));
static CHUNKED_LARGE: ResponseFixture =
    ResponseFixture::large("chunked_large", include_bytes!("../resources/response/chunked_large.txt"));

fn benchmark_response_parser(criterion: &mut Criterion) {
    let parser = ResponseParser::new(&ParserConfig::default(), Duration::from_secs(1));
    let mut group = criterion.benchmark_group("response_parser");

    for fixture in [PLAIN_SMALL, PLAIN_LARGE_HEADER, CHUNKED_SMALL, CHUNKED_LARGE] {
        group.throughput(Throughput::Bytes(fixture.len()));
        group.bench_with_input(BenchmarkId::from_parameter(fixture.name()), &fixture, |b, fixture| {
            b.iter_batched(
                || fixture.raw(),
                |raw| {
                    let mut response = parser.parse(raw).expect("fixture should be a valid http response");
                    let body = response.body().read_bytes_to_length(None).expect("fixture body should decode");
                    black_box((response.status_code(), body));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_chunked_decoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("chunked_decoder");

    for fixture in [CHUNKED_SMALL, CHUNKED_LARGE] {
        let body = &fixture.raw()[fixture.body_offset()..];
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fixture.name()), &body, |b, body| {
            let mut out = Vec::with_capacity(body.len());
            b.iter(|| {
                out.clear();
                let mut decoder = ChunkedDecoder::new(PushbackStream::new(*body));
                decoder.read_to_end(&mut out).expect("fixture should be validly chunked");
                black_box(out.len());
            });
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_response_parser, benchmark_chunked_decoder);
criterion_main!(decoder);
