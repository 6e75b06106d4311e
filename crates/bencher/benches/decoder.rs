use std::hint::black_box;
use bencher::{TestCase, TestFile};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use micro_stomp::codec::FrameDecoder;
use micro_stomp::protocol::ProtocolLevel;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

static CONNECTED: TestFile = TestFile::new("connected.txt", include_str!("../resources/frame/connected.txt"));
static SMALL_MESSAGE: TestFile = TestFile::new("message_small.txt", include_str!("../resources/frame/message_small.txt"));
static LARGE_MESSAGE: TestFile = TestFile::new("message_large.txt", include_str!("../resources/frame/message_large.txt"));

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("connected_decoder", CONNECTED),
        TestCase::small("small_message_decoder", SMALL_MESSAGE),
        TestCase::large("large_message_decoder", LARGE_MESSAGE),
    ]
}

fn benchmark_frame_decoder(criterion: &mut Criterion) {
    let test_cases = create_test_cases();
    let mut group = criterion.benchmark_group("frame_decoder");

    for case in test_cases {
        group.throughput(Throughput::Bytes(case.file().content().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            let mut frame_decoder = FrameDecoder::new();
            frame_decoder.set_protocol(ProtocolLevel::V1_2);
            b.iter_batched_ref(
                || BytesMut::from(case.file().content()),
                |bytes_mut| {
                    let frame = frame_decoder.decode(bytes_mut).expect("input should be a valid stomp frame").unwrap();
                    black_box(frame);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_heartbeat_stream(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("heartbeat_stream");
    let beats = "\n\r\n".repeat(512);
    group.throughput(Throughput::Bytes(beats.len() as u64));

    group.bench_function("interleaved_eol", |b| {
        let mut frame_decoder = FrameDecoder::new();
        b.iter_batched_ref(
            || BytesMut::from(beats.as_str()),
            |bytes_mut| {
                while let Some(item) = frame_decoder.decode(bytes_mut).expect("heart-beats are always valid") {
                    black_box(item);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(decoder, benchmark_frame_decoder, benchmark_heartbeat_stream);
criterion_main!(decoder);
